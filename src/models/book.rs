//! Book model and the copy-inventory ledger.
//!
//! The ledger invariant for every book: `0 <= nb_available <= nb_owned`.
//! Each open loan accounts for exactly one unit of `nb_owned - nb_available`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Full book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub year: i32,
    pub author_id: i32,
    /// Copies owned by the library
    pub nb_owned: i32,
    /// Copies currently on the shelf
    pub nb_available: i32,
    pub description: Option<String>,
    pub category: Option<String>,
    pub language: String,
    pub pages: i32,
    pub house: Option<String>,
}

impl Book {
    /// Take one copy off the shelf for a checkout.
    pub fn reserve_copy(&mut self) -> AppResult<()> {
        if self.nb_available == 0 {
            return Err(AppError::OutOfStock { book_id: self.id });
        }
        self.nb_available -= 1;
        Ok(())
    }

    /// Put one copy back on the shelf at return time.
    ///
    /// Exceeding `nb_owned` means a return was recorded for a copy that was
    /// never lent out, which is a data-integrity defect rather than a user
    /// error.
    pub fn release_copy(&mut self) -> AppResult<()> {
        if self.nb_available >= self.nb_owned {
            return Err(AppError::InconsistentState(format!(
                "book {}: release would exceed the {} owned copies",
                self.id, self.nb_owned
            )));
        }
        self.nb_available += 1;
        Ok(())
    }
}

/// Create book request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBook {
    pub title: String,
    pub isbn: String,
    pub year: i32,
    pub author_id: i32,
    pub nb_owned: i32,
    /// Defaults to `nb_owned` (all copies on the shelf)
    pub nb_available: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub language: String,
    pub pages: i32,
    pub house: Option<String>,
}

/// Update book request; absent fields are left untouched
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub year: Option<i32>,
    pub author_id: Option<i32>,
    pub nb_owned: Option<i32>,
    pub nb_available: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub house: Option<String>,
}

/// Book search filters
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
    pub language: Option<String>,
    /// true: at least one copy on the shelf; false: none
    pub available: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Sortable book columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
    #[default]
    Title,
    Year,
    Author,
}

impl BookSort {
    pub fn as_column(&self) -> &'static str {
        match self {
            BookSort::Title => "title",
            BookSort::Year => "year",
            BookSort::Author => "author_id",
        }
    }
}

impl FromStr for BookSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(BookSort::Title),
            "year" => Ok(BookSort::Year),
            "author" => Ok(BookSort::Author),
            other => Err(AppError::InvalidSort(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(owned: i32, available: i32) -> Book {
        Book {
            id: 1,
            title: "Les Misérables".to_string(),
            isbn: "9780140444308".to_string(),
            year: 1862,
            author_id: 1,
            nb_owned: owned,
            nb_available: available,
            description: None,
            category: None,
            language: "fr".to_string(),
            pages: 1232,
            house: None,
        }
    }

    #[test]
    fn test_reserve_decrements() {
        let mut b = book(3, 2);
        b.reserve_copy().unwrap();
        assert_eq!(b.nb_available, 1);
    }

    #[test]
    fn test_reserve_out_of_stock() {
        let mut b = book(3, 0);
        let err = b.reserve_copy().unwrap_err();
        assert!(matches!(err, AppError::OutOfStock { book_id: 1 }));
        assert_eq!(b.nb_available, 0);
    }

    #[test]
    fn test_release_increments() {
        let mut b = book(3, 1);
        b.release_copy().unwrap();
        assert_eq!(b.nb_available, 2);
    }

    #[test]
    fn test_release_never_exceeds_owned() {
        let mut b = book(3, 3);
        let err = b.release_copy().unwrap_err();
        assert!(matches!(err, AppError::InconsistentState(_)));
        assert_eq!(b.nb_available, 3);
    }

    #[test]
    fn test_reserve_release_round_trip() {
        let mut b = book(2, 2);
        b.reserve_copy().unwrap();
        b.release_copy().unwrap();
        assert_eq!(b.nb_available, 2);
    }
}
