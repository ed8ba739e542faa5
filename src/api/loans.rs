//! Loan lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{CheckoutLoan, Loan, LoanListParams},
};

use super::PaginatedResponse;

/// Checkout request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Book to borrow
    pub book_id: i32,
    /// Borrower's display name
    pub loaner_name: String,
    /// Borrower's contact address
    pub loaner_contact: String,
    /// Borrower's card number
    pub loaner_card: i64,
    /// Loan start date (defaults to today)
    pub start_date: Option<NaiveDate>,
    /// Free-text comment
    pub notes: Option<String>,
}

/// Renewal response with the new due date
#[derive(Serialize, ToSchema)]
pub struct RenewResponse {
    /// Loan ID
    pub id: i32,
    /// New due date
    pub due_date: NaiveDate,
    /// Status message
    pub message: String,
}

/// Return response with the closed loan
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    /// Days past due, zero when on time
    pub late_days: i32,
    /// Late penalty charged, in minor currency units
    pub penalty: i64,
    /// Closed loan record
    pub loan: Loan,
}

/// List loans through the reporting views
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(
        ("status" = Option<String>, Query, description = "View: active, late or history"),
        ("contact" = Option<String>, Query, description = "Exact loaner contact"),
        ("card" = Option<i64>, Query, description = "Loaner card number"),
        ("book_id" = Option<i32>, Query, description = "Filter by book"),
        ("started_from" = Option<NaiveDate>, Query, description = "Earliest start date"),
        ("started_to" = Option<NaiveDate>, Query, description = "Latest start date"),
        ("sort_by" = Option<String>, Query, description = "Sort column: start_date, due_date or returned_date"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("page_size" = Option<i64>, Query, description = "Items per page (default: 10)")
    ),
    responses(
        (status = 200, description = "Matching loans", body = PaginatedResponse<Loan>),
        (status = 400, description = "Malformed parameters")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(params): Query<LoanListParams>,
) -> AppResult<Json<PaginatedResponse<Loan>>> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(10);
    let (loans, total) = state.services.loans.list_loans(&params).await?;

    Ok(Json(PaginatedResponse::new(
        loans,
        total,
        page,
        page_size.min(state.config.lending.max_page_size),
    )))
}

/// Borrow a book (creates an active loan)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Out of stock or borrow limit reached")
    )
)]
pub async fn checkout(
    State(state): State<crate::AppState>,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .loans
        .checkout(CheckoutLoan {
            book_id: request.book_id,
            loaner_name: request.loaner_name,
            loaner_contact: request.loaner_contact,
            loaner_card: request.loaner_card,
            start_date: request.start_date,
            notes: request.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan record", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let loan = state.services.loans.return_loan(id).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        late_days: loan.late_days,
        penalty: loan.penalty,
        loan,
    }))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan renewed", body = RenewResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Renewal limit reached or already returned")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<RenewResponse>> {
    let loan = state.services.loans.renew_loan(id).await?;

    Ok(Json(RenewResponse {
        id: loan.id,
        due_date: loan.due_date,
        message: format!("Loan renewed ({} renewal{})", loan.nb_renews,
            if loan.nb_renews == 1 { "" } else { "s" }),
    }))
}
