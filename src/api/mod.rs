//! API handlers for the Bibliothèque REST endpoints

pub mod authors;
pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;

use serde::Serialize;
use utoipa::ToSchema;

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// List of items
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub page_size: i64,
    /// Total number of pages
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: (total + page_size - 1) / page_size,
        }
    }
}
