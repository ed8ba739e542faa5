//! Clock port for lifecycle date computations.
//!
//! Lateness and due dates are pure functions of the current date, so the
//! engine takes its notion of "today" from an injected clock rather than
//! reading the wall clock inline.

use chrono::{NaiveDate, Utc};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    /// Current calendar date
    fn today(&self) -> NaiveDate;
}

/// Wall-clock implementation used in production
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
