//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, books, health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "La Bibliothèque API",
        version = "1.0.0",
        description = "REST API for managing books, authors and loans",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Authors
        authors::list_authors,
        authors::search_authors,
        authors::create_author,
        authors::get_author,
        authors::update_author,
        authors::delete_author,
        // Books
        books::list_books,
        books::search_books,
        books::create_book,
        books::get_book,
        books::update_book,
        books::delete_book,
        // Loans
        loans::list_loans,
        loans::checkout,
        loans::get_loan,
        loans::return_loan,
        loans::renew_loan,
    ),
    components(
        schemas(
            // Authors
            crate::models::author::Author,
            crate::models::author::CreateAuthor,
            crate::models::author::UpdateAuthor,
            authors::AuthorDetails,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::BookQuery,
            books::BookDetails,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanListParams,
            loans::CheckoutRequest,
            loans::RenewResponse,
            loans::ReturnResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "authors", description = "Author record management"),
        (name = "books", description = "Book record management"),
        (name = "loans", description = "Loan lifecycle and reporting")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
