//! Error types for the Bibliothèque server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Author with id {0} not found")]
    AuthorNotFound(i32),

    #[error("Book with id {0} not found")]
    BookNotFound(i32),

    #[error("Loan with id {0} not found")]
    LoanNotFound(i32),

    #[error("No copy of book {book_id} is available")]
    OutOfStock { book_id: i32 },

    #[error("Loan {loan_id} has already been returned")]
    AlreadyReturned { loan_id: i32 },

    #[error("Maximum concurrent loans reached ({current}/{limit})")]
    BorrowLimitExceeded { limit: i16, current: i64 },

    #[error("Maximum renewals reached for loan {loan_id} ({max} allowed)")]
    RenewalLimitExceeded { loan_id: i32, max: i16 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unknown status filter: {0}")]
    InvalidStatus(String),

    #[error("Unknown sort field: {0}")]
    InvalidSort(String),

    #[error("Unknown sort order: {0}")]
    InvalidOrder(String),

    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    /// Stable machine-readable label for the error kind
    fn label(&self) -> &'static str {
        match self {
            AppError::AuthorNotFound(_) => "author_not_found",
            AppError::BookNotFound(_) => "book_not_found",
            AppError::LoanNotFound(_) => "loan_not_found",
            AppError::OutOfStock { .. } => "out_of_stock",
            AppError::AlreadyReturned { .. } => "already_returned",
            AppError::BorrowLimitExceeded { .. } => "borrow_limit_exceeded",
            AppError::RenewalLimitExceeded { .. } => "renewal_limit_exceeded",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidStatus(_) => "invalid_status",
            AppError::InvalidSort(_) => "invalid_sort",
            AppError::InvalidOrder(_) => "invalid_order",
            AppError::InconsistentState(_) => "inconsistent_state",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::AuthorNotFound(_)
            | AppError::BookNotFound(_)
            | AppError::LoanNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::OutOfStock { .. }
            | AppError::AlreadyReturned { .. }
            | AppError::BorrowLimitExceeded { .. }
            | AppError::RenewalLimitExceeded { .. }
            | AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::BadRequest(_)
            | AppError::InvalidStatus(_)
            | AppError::InvalidSort(_)
            | AppError::InvalidOrder(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InconsistentState(msg) => {
                tracing::error!("Inconsistent state: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Inconsistent state".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: self.label().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
