//! Author model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::AppError;

/// Full author model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub birth: NaiveDate,
    pub country: String,
    pub bio: Option<String>,
    pub death: Option<NaiveDate>,
    pub website: Option<String>,
}

/// Create author request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAuthor {
    pub firstname: String,
    pub lastname: String,
    pub birth: NaiveDate,
    pub country: String,
    pub bio: Option<String>,
    pub death: Option<NaiveDate>,
    pub website: Option<String>,
}

/// Update author request; absent fields are left untouched
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAuthor {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub birth: Option<NaiveDate>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub death: Option<NaiveDate>,
    pub website: Option<String>,
}

/// Sortable author columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorSort {
    #[default]
    Lastname,
    Firstname,
    Birth,
}

impl AuthorSort {
    pub fn as_column(&self) -> &'static str {
        match self {
            AuthorSort::Lastname => "lastname",
            AuthorSort::Firstname => "firstname",
            AuthorSort::Birth => "birth",
        }
    }
}

impl FromStr for AuthorSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lastname" => Ok(AuthorSort::Lastname),
            "firstname" => Ok(AuthorSort::Firstname),
            "birth" => Ok(AuthorSort::Birth),
            other => Err(AppError::InvalidSort(other.to_string())),
        }
    }
}
