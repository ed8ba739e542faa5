//! Loan model and lifecycle predicates.
//!
//! A loan has two states: active (open) and returned (closed, terminal).
//! `active == true` exactly when `returned_date` is absent. Lateness is a
//! pure function of the due date and an observation date; the lifecycle
//! engine and the reporting views both go through [`Loan::late_days_at`] so
//! a displayed overdue count always matches what a return would record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;
use std::str::FromStr;
use utoipa::ToSchema;

use super::SortOrder;
use crate::error::AppError;

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub loaner_name: String,
    pub loaner_contact: String,
    pub loaner_card: i64,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub returned_date: Option<NaiveDate>,
    pub active: bool,
    pub nb_renews: i16,
    /// Days past due, recorded once at return time
    pub late_days: i32,
    /// Late penalty in minor currency units, recorded once at return time
    pub penalty: i64,
    pub notes: Option<String>,
}

impl Loan {
    /// Days past the due date as observed on `date`, floored at zero.
    pub fn late_days_at(&self, date: NaiveDate) -> i32 {
        (date - self.due_date).num_days().max(0) as i32
    }

    /// An open loan past its due date as of `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.active && self.due_date < today
    }
}

/// Checkout request handed to the lifecycle engine
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLoan {
    pub book_id: i32,
    pub loaner_name: String,
    pub loaner_contact: String,
    pub loaner_card: i64,
    /// Defaults to the current date
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// New loan payload, produced by the lifecycle engine at checkout.
///
/// The store persists it with `active = true`, `nb_renews = 0` and zeroed
/// lateness fields.
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub loaner_name: String,
    pub loaner_contact: String,
    pub loaner_card: i64,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

/// Loan classification for the reporting views.
///
/// The three views are disjoint except that `late` is a subset of `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanStatus {
    Active,
    Late,
    History,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Late => "late",
            LoanStatus::History => "history",
        }
    }

    /// Whether `loan` belongs to this view as of `today`.
    pub fn matches(&self, loan: &Loan, today: NaiveDate) -> bool {
        match self {
            LoanStatus::Active => loan.active,
            LoanStatus::Late => loan.is_overdue(today),
            LoanStatus::History => !loan.active,
        }
    }
}

impl FromStr for LoanStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "late" => Ok(LoanStatus::Late),
            "history" => Ok(LoanStatus::History),
            other => Err(AppError::InvalidStatus(other.to_string())),
        }
    }
}

/// Sortable loan columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoanSort {
    #[default]
    StartDate,
    DueDate,
    ReturnedDate,
}

impl LoanSort {
    pub fn as_column(&self) -> &'static str {
        match self {
            LoanSort::StartDate => "start_date",
            LoanSort::DueDate => "due_date",
            LoanSort::ReturnedDate => "returned_date",
        }
    }

    /// Comparator matching the SQL `ORDER BY` for the in-memory store.
    /// Open loans (no returned date) sort after closed ones when ascending,
    /// as Postgres puts NULLs last.
    pub fn compare(&self, a: &Loan, b: &Loan) -> Ordering {
        match self {
            LoanSort::StartDate => a.start_date.cmp(&b.start_date),
            LoanSort::DueDate => a.due_date.cmp(&b.due_date),
            LoanSort::ReturnedDate => match (a.returned_date, b.returned_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
            },
        }
    }
}

impl FromStr for LoanSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_date" => Ok(LoanSort::StartDate),
            "due_date" => Ok(LoanSort::DueDate),
            "returned_date" => Ok(LoanSort::ReturnedDate),
            other => Err(AppError::InvalidSort(other.to_string())),
        }
    }
}

/// Raw query parameters for the loan reporting views, as they arrive from
/// the request layer. Parsed and validated by the facade.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoanListParams {
    /// One of `active`, `late`, `history`
    pub status: Option<String>,
    pub contact: Option<String>,
    pub card: Option<i64>,
    pub book_id: Option<i32>,
    pub started_from: Option<NaiveDate>,
    pub started_to: Option<NaiveDate>,
    /// One of `start_date`, `due_date`, `returned_date`
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Fully validated loan range query, built by the reporting facade.
#[derive(Debug, Clone)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub contact: Option<String>,
    pub card: Option<i64>,
    pub book_id: Option<i32>,
    pub started_from: Option<NaiveDate>,
    pub started_to: Option<NaiveDate>,
    pub sort_by: LoanSort,
    pub order: SortOrder,
    /// Observation date for the `late` view
    pub as_of: NaiveDate,
    pub offset: i64,
    pub limit: i64,
}

impl LoanQuery {
    /// Filter predicate matching the SQL `WHERE` clause.
    pub fn matches(&self, loan: &Loan) -> bool {
        if let Some(status) = self.status {
            if !status.matches(loan, self.as_of) {
                return false;
            }
        }
        if let Some(ref contact) = self.contact {
            if &loan.loaner_contact != contact {
                return false;
            }
        }
        if let Some(card) = self.card {
            if loan.loaner_card != card {
                return false;
            }
        }
        if let Some(book_id) = self.book_id {
            if loan.book_id != book_id {
                return false;
            }
        }
        if let Some(from) = self.started_from {
            if loan.start_date < from {
                return false;
            }
        }
        if let Some(to) = self.started_to {
            if loan.start_date > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan() -> Loan {
        Loan {
            id: 1,
            book_id: 1,
            loaner_name: "Jean Valjean".to_string(),
            loaner_contact: "24601 rue de Digne".to_string(),
            loaner_card: 24601,
            start_date: date(2024, 1, 1),
            due_date: date(2024, 1, 29),
            returned_date: None,
            active: true,
            nb_renews: 0,
            late_days: 0,
            penalty: 0,
            notes: None,
        }
    }

    #[test]
    fn test_late_days_before_due() {
        assert_eq!(loan().late_days_at(date(2024, 1, 20)), 0);
    }

    #[test]
    fn test_late_days_on_due_date() {
        assert_eq!(loan().late_days_at(date(2024, 1, 29)), 0);
    }

    #[test]
    fn test_late_days_past_due() {
        assert_eq!(loan().late_days_at(date(2024, 2, 5)), 7);
    }

    #[test]
    fn test_overdue_only_when_active() {
        let mut l = loan();
        assert!(l.is_overdue(date(2024, 2, 1)));
        l.active = false;
        l.returned_date = Some(date(2024, 2, 1));
        assert!(!l.is_overdue(date(2024, 2, 1)));
    }

    #[test]
    fn test_late_view_subset_of_active() {
        let today = date(2024, 2, 1);
        let open = loan();
        let mut closed = loan();
        closed.active = false;
        closed.returned_date = Some(today);
        for l in [&open, &closed] {
            if LoanStatus::Late.matches(l, today) {
                assert!(LoanStatus::Active.matches(l, today));
            }
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("active".parse::<LoanStatus>().unwrap(), LoanStatus::Active);
        assert_eq!("late".parse::<LoanStatus>().unwrap(), LoanStatus::Late);
        assert_eq!(
            "history".parse::<LoanStatus>().unwrap(),
            LoanStatus::History
        );
        assert!(matches!(
            "overdue".parse::<LoanStatus>(),
            Err(AppError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(
            "due_date".parse::<LoanSort>().unwrap(),
            LoanSort::DueDate
        );
        assert!(matches!(
            "penalty".parse::<LoanSort>(),
            Err(AppError::InvalidSort(_))
        ));
        assert!(matches!(
            "ascending".parse::<SortOrder>(),
            Err(AppError::InvalidOrder(_))
        ));
    }
}
