//! Business logic services

pub mod catalog;
pub mod loans;

use std::sync::Arc;

use crate::{
    clock::SystemClock,
    config::LendingConfig,
    error::{AppError, AppResult},
    repository::{loans::PgLoanStore, Repository},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoanService<PgLoanStore>,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, lending: LendingConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), lending.clone()),
            loans: loans::LoanService::new(
                repository.loans.clone(),
                Arc::new(SystemClock),
                lending,
            ),
        }
    }
}

/// Validate pagination parameters and derive the row offset.
///
/// `page` starts at 1; `page_size` is capped at `max_page_size`.
pub(crate) fn page_params(
    page: Option<i64>,
    page_size: Option<i64>,
    max_page_size: i64,
) -> AppResult<(i64, i64, i64)> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::BadRequest("page must be >= 1".to_string()));
    }
    let page_size = page_size.unwrap_or(10);
    if page_size < 1 {
        return Err(AppError::BadRequest("page_size must be >= 1".to_string()));
    }
    let page_size = page_size.min(max_page_size);
    Ok((page, page_size, (page - 1) * page_size))
}
