//! Author management endpoints

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
        author::{Author, CreateAuthor, UpdateAuthor},
        book::Book,
    },
};

use super::PaginatedResponse;

/// List/search parameters for authors
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AuthorListQuery {
    /// Fragment matched against first or last name
    pub name: Option<String>,
    pub country: Option<String>,
    /// One of `lastname`, `firstname`, `birth`
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Author with their books
#[derive(Serialize, ToSchema)]
pub struct AuthorDetails {
    pub author: Author,
    pub books: Vec<Book>,
}

/// List authors with pagination
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    params(
        ("sort_by" = Option<String>, Query, description = "Sort column: lastname, firstname or birth"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("page_size" = Option<i64>, Query, description = "Items per page (default: 10)")
    ),
    responses(
        (status = 200, description = "List of authors", body = PaginatedResponse<Author>),
        (status = 400, description = "Malformed parameters")
    )
)]
pub async fn list_authors(
    State(state): State<crate::AppState>,
    Query(query): Query<AuthorListQuery>,
) -> AppResult<Json<PaginatedResponse<Author>>> {
    let (authors, total) = state
        .services
        .catalog
        .search_authors(
            None,
            None,
            query.sort_by.as_deref(),
            query.order.as_deref(),
            query.page,
            query.page_size,
        )
        .await?;

    Ok(Json(PaginatedResponse::new(
        authors,
        total,
        query.page.unwrap_or(1),
        query
            .page_size
            .unwrap_or(10)
            .min(state.config.lending.max_page_size),
    )))
}

/// Search authors by name fragment and country
#[utoipa::path(
    get,
    path = "/authors/search",
    tag = "authors",
    params(
        ("name" = Option<String>, Query, description = "Fragment of first or last name"),
        ("country" = Option<String>, Query, description = "Exact country"),
        ("sort_by" = Option<String>, Query, description = "Sort column: lastname, firstname or birth"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("page_size" = Option<i64>, Query, description = "Items per page (default: 10)")
    ),
    responses(
        (status = 200, description = "Matching authors", body = PaginatedResponse<Author>),
        (status = 400, description = "Malformed parameters")
    )
)]
pub async fn search_authors(
    State(state): State<crate::AppState>,
    Query(query): Query<AuthorListQuery>,
) -> AppResult<Json<PaginatedResponse<Author>>> {
    let (authors, total) = state
        .services
        .catalog
        .search_authors(
            query.name.as_deref(),
            query.country.as_deref(),
            query.sort_by.as_deref(),
            query.order.as_deref(),
            query.page,
            query.page_size,
        )
        .await?;

    Ok(Json(PaginatedResponse::new(
        authors,
        total,
        query.page.unwrap_or(1),
        query
            .page_size
            .unwrap_or(10)
            .min(state.config.lending.max_page_size),
    )))
}

/// Create a new author
#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    request_body = CreateAuthor,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 409, description = "Author already exists")
    )
)]
pub async fn create_author(
    State(state): State<crate::AppState>,
    Json(author): Json<CreateAuthor>,
) -> AppResult<(StatusCode, Json<Author>)> {
    let created = state.services.catalog.create_author(author).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get an author with their books
#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 200, description = "Author details", body = AuthorDetails),
        (status = 404, description = "Author not found")
    )
)]
pub async fn get_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<AuthorDetails>> {
    let (author, books) = state.services.catalog.get_author(id).await?;
    Ok(Json(AuthorDetails { author, books }))
}

/// Update an author
#[utoipa::path(
    patch,
    path = "/authors/{id}",
    tag = "authors",
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    request_body = UpdateAuthor,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 404, description = "Author not found")
    )
)]
pub async fn update_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(update): Json<UpdateAuthor>,
) -> AppResult<Json<Author>> {
    let updated = state.services.catalog.update_author(id, update).await?;
    Ok(Json(updated))
}

/// Delete an author without books
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "authors",
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Author deleted"),
        (status = 404, description = "Author not found"),
        (status = 409, description = "Author still has books")
    )
)]
pub async fn delete_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_author(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
