//! Book management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        author::Author,
        book::{Book, BookQuery, CreateBook, UpdateBook},
    },
};

use super::PaginatedResponse;

/// List parameters for books
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BookListQuery {
    /// One of `title`, `year`, `author`
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Book with its author
#[derive(Serialize, ToSchema)]
pub struct BookDetails {
    pub book: Book,
    pub author: Author,
}

/// List books with sorting and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(
        ("sort_by" = Option<String>, Query, description = "Sort column: title, year or author"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("page_size" = Option<i64>, Query, description = "Items per page (default: 10)")
    ),
    responses(
        (status = 200, description = "List of books", body = PaginatedResponse<Book>),
        (status = 400, description = "Malformed parameters")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookListQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total) = state
        .services
        .catalog
        .list_books(
            query.sort_by.as_deref(),
            query.order.as_deref(),
            query.page,
            query.page_size,
        )
        .await?;

    Ok(Json(PaginatedResponse::new(
        books,
        total,
        query.page.unwrap_or(1),
        query
            .page_size
            .unwrap_or(10)
            .min(state.config.lending.max_page_size),
    )))
}

/// Search books with filters
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    params(
        ("title" = Option<String>, Query, description = "Fragment of the title"),
        ("author_name" = Option<String>, Query, description = "Fragment of the author's name"),
        ("isbn" = Option<String>, Query, description = "Exact ISBN"),
        ("category" = Option<String>, Query, description = "Exact category"),
        ("year" = Option<i32>, Query, description = "Publication year"),
        ("language" = Option<String>, Query, description = "Exact language"),
        ("available" = Option<bool>, Query, description = "Availability on the shelf"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("page_size" = Option<i64>, Query, description = "Items per page (default: 10)")
    ),
    responses(
        (status = 200, description = "Matching books", body = PaginatedResponse<Book>),
        (status = 400, description = "Malformed parameters")
    )
)]
pub async fn search_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total) = state.services.catalog.search_books(&query).await?;

    Ok(Json(PaginatedResponse::new(
        books,
        total,
        query.page.unwrap_or(1),
        query
            .page_size
            .unwrap_or(10)
            .min(state.config.lending.max_page_size),
    )))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid copy counts"),
        (status = 404, description = "Referenced author not found"),
        (status = 409, description = "ISBN already exists")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get a book with its author
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<BookDetails>> {
    let (book, author) = state.services.catalog.get_book(id).await?;
    Ok(Json(BookDetails { book, author }))
}

/// Update a book
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid copy counts"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "ISBN already exists")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let updated = state.services.catalog.update_book(id, update).await?;
    Ok(Json(updated))
}

/// Delete a book with no loan records
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book has loan records")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
