//! In-memory loan store with transactional semantics.
//!
//! Backs the lifecycle engine's unit tests. A transaction clones the whole
//! state at `begin` and swaps it back in at `commit`; dropping the
//! transaction without committing discards every staged write, matching the
//! all-or-nothing behavior of the Postgres store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{
        book::Book,
        loan::{Loan, LoanQuery, NewLoan},
        SortOrder,
    },
};

use super::loans::{LoanStore, LoanStoreTx};

#[derive(Debug, Clone, Default)]
struct State {
    books: BTreeMap<i32, Book>,
    loans: BTreeMap<i32, Loan>,
    next_loan_id: i32,
}

/// Shared in-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryLoanStore {
    state: Arc<Mutex<State>>,
}

impl MemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("state mutex poisoned")
    }

    /// Seed or replace a book record
    pub fn put_book(&self, book: Book) {
        self.lock().books.insert(book.id, book);
    }

    /// Drop a book record, dangling loans included. Lets tests stage the
    /// store corruption the engine reports as inconsistent state.
    pub fn remove_book(&self, id: i32) {
        self.lock().books.remove(&id);
    }

    /// Snapshot of a book record
    pub fn book(&self, id: i32) -> Option<Book> {
        self.lock().books.get(&id).cloned()
    }

    /// Snapshot of a loan record
    pub fn loan(&self, id: i32) -> Option<Loan> {
        self.lock().loans.get(&id).cloned()
    }
}

#[async_trait]
impl LoanStore for MemoryLoanStore {
    type Tx = MemoryLoanTx;

    async fn begin(&self) -> AppResult<Self::Tx> {
        let staged = self.lock().clone();
        Ok(MemoryLoanTx {
            shared: Arc::clone(&self.state),
            staged,
        })
    }

    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.lock().loans.get(&id).cloned())
    }

    async fn find_loans(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        let mut matched: Vec<Loan> = self
            .lock()
            .loans
            .values()
            .filter(|l| query.matches(l))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ord = query.sort_by.compare(a, b);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }
}

/// Staged copy of the store state; swapped in atomically on commit
pub struct MemoryLoanTx {
    shared: Arc<Mutex<State>>,
    staged: State,
}

#[async_trait]
impl LoanStoreTx for MemoryLoanTx {
    async fn get_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.staged.books.get(&id).cloned())
    }

    async fn save_book_copies(&mut self, book_id: i32, nb_available: i32) -> AppResult<()> {
        if let Some(book) = self.staged.books.get_mut(&book_id) {
            book.nb_available = nb_available;
        }
        Ok(())
    }

    async fn get_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.staged.loans.get(&id).cloned())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        self.staged.next_loan_id += 1;
        let created = Loan {
            id: self.staged.next_loan_id,
            book_id: loan.book_id,
            loaner_name: loan.loaner_name.clone(),
            loaner_contact: loan.loaner_contact.clone(),
            loaner_card: loan.loaner_card,
            start_date: loan.start_date,
            due_date: loan.due_date,
            returned_date: None,
            active: true,
            nb_renews: 0,
            late_days: 0,
            penalty: 0,
            notes: loan.notes.clone(),
        };
        self.staged.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn apply_renewal(
        &mut self,
        loan_id: i32,
        due_date: NaiveDate,
        nb_renews: i16,
    ) -> AppResult<()> {
        if let Some(loan) = self.staged.loans.get_mut(&loan_id) {
            loan.due_date = due_date;
            loan.nb_renews = nb_renews;
        }
        Ok(())
    }

    async fn apply_return(
        &mut self,
        loan_id: i32,
        returned_date: NaiveDate,
        late_days: i32,
        penalty: i64,
    ) -> AppResult<()> {
        if let Some(loan) = self.staged.loans.get_mut(&loan_id) {
            loan.returned_date = Some(returned_date);
            loan.active = false;
            loan.late_days = late_days;
            loan.penalty = penalty;
        }
        Ok(())
    }

    async fn count_active_loans_for(&mut self, contact: &str, card: i64) -> AppResult<i64> {
        let count = self
            .staged
            .loans
            .values()
            .filter(|l| l.active && (l.loaner_contact == contact || l.loaner_card == card))
            .count();
        Ok(count as i64)
    }

    async fn commit(self) -> AppResult<()> {
        *self.shared.lock().expect("state mutex poisoned") = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: i32, owned: i32, available: i32) -> Book {
        Book {
            id,
            title: format!("Book {}", id),
            isbn: format!("isbn-{}", id),
            year: 2000,
            author_id: 1,
            nb_owned: owned,
            nb_available: available,
            description: None,
            category: None,
            language: "fr".to_string(),
            pages: 100,
            house: None,
        }
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let store = MemoryLoanStore::new();
        store.put_book(book(1, 3, 3));

        let mut tx = store.begin().await.unwrap();
        tx.save_book_copies(1, 2).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.book(1).unwrap().nb_available, 2);
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = MemoryLoanStore::new();
        store.put_book(book(1, 3, 3));

        let mut tx = store.begin().await.unwrap();
        tx.save_book_copies(1, 0).await.unwrap();
        drop(tx);

        assert_eq!(store.book(1).unwrap().nb_available, 3);
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryLoanStore::new();
        let new = NewLoan {
            book_id: 1,
            loaner_name: "A".to_string(),
            loaner_contact: "a@example.org".to_string(),
            loaner_card: 1,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 29).unwrap(),
            notes: None,
        };

        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_loan(&new).await.unwrap();
        let second = tx.insert_loan(&new).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(store.loan(2).is_some());
    }
}
