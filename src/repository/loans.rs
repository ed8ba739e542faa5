//! Loan record store: the port consumed by the lifecycle engine, and its
//! Postgres implementation.
//!
//! Checkout and return are compound read-check-mutate-write operations over
//! one book and one loan, so every engine operation runs inside a store
//! transaction. A [`LoanStoreTx`] that is dropped without [`commit`] rolls
//! back, leaving the copy-count invariant intact on every error path. The
//! mutating methods are per-transition: each statement enumerates exactly
//! the columns that transition may touch.
//!
//! [`commit`]: LoanStoreTx::commit

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::AppResult,
    models::{
        book::Book,
        loan::{Loan, LoanQuery, NewLoan},
    },
};

/// Record store port for loan lifecycle operations
#[async_trait]
pub trait LoanStore: Send + Sync {
    type Tx: LoanStoreTx;

    /// Open a transaction spanning one engine operation
    async fn begin(&self) -> AppResult<Self::Tx>;

    /// Look up a loan outside any transaction
    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>>;

    /// Filtered, sorted range query over loans; returns the page and the
    /// total match count
    async fn find_loans(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)>;
}

/// One atomic engine operation. Rolls back unless committed.
#[async_trait]
pub trait LoanStoreTx: Send {
    async fn get_book(&mut self, id: i32) -> AppResult<Option<Book>>;

    /// Persist a book's available-copy count (the only book field the
    /// lifecycle may touch)
    async fn save_book_copies(&mut self, book_id: i32, nb_available: i32) -> AppResult<()>;

    async fn get_loan(&mut self, id: i32) -> AppResult<Option<Loan>>;

    /// Insert a loan in its initial state
    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    /// Record a renewal: due date and renewal count only
    async fn apply_renewal(
        &mut self,
        loan_id: i32,
        due_date: NaiveDate,
        nb_renews: i16,
    ) -> AppResult<()>;

    /// Record the terminal return transition: close the loan and store the
    /// lateness figures computed by the engine
    async fn apply_return(
        &mut self,
        loan_id: i32,
        returned_date: NaiveDate,
        late_days: i32,
        penalty: i64,
    ) -> AppResult<()>;

    /// Count active loans whose contact address or card number matches
    async fn count_active_loans_for(&mut self, contact: &str, card: i64) -> AppResult<i64>;

    async fn commit(self) -> AppResult<()>;
}

/// Postgres-backed loan store
#[derive(Clone)]
pub struct PgLoanStore {
    pool: Pool<Postgres>,
}

impl PgLoanStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const LOAN_FILTER: &str = r#"
    ($1::text IS NULL OR loaner_contact = $1)
    AND ($2::bigint IS NULL OR loaner_card = $2)
    AND ($3::int IS NULL OR book_id = $3)
    AND ($4::date IS NULL OR start_date >= $4)
    AND ($5::date IS NULL OR start_date <= $5)
    AND ($6::text IS NULL
         OR ($6 = 'active' AND active)
         OR ($6 = 'late' AND active AND due_date < $7)
         OR ($6 = 'history' AND NOT active))
"#;

#[async_trait]
impl LoanStore for PgLoanStore {
    type Tx = PgLoanTx;

    async fn begin(&self) -> AppResult<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PgLoanTx { tx })
    }

    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    async fn find_loans(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        let status = query.status.map(|s| s.as_str());

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM loans WHERE {}", LOAN_FILTER))
                .bind(&query.contact)
                .bind(query.card)
                .bind(query.book_id)
                .bind(query.started_from)
                .bind(query.started_to)
                .bind(status)
                .bind(query.as_of)
                .fetch_one(&self.pool)
                .await?;

        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT * FROM loans WHERE {} ORDER BY {} {} LIMIT $8 OFFSET $9",
            LOAN_FILTER,
            query.sort_by.as_column(),
            query.order.as_sql(),
        ))
        .bind(&query.contact)
        .bind(query.card)
        .bind(query.book_id)
        .bind(query.started_from)
        .bind(query.started_to)
        .bind(status)
        .bind(query.as_of)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((loans, total))
    }
}

/// Transaction wrapper over one engine operation
pub struct PgLoanTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LoanStoreTx for PgLoanTx {
    async fn get_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn save_book_copies(&mut self, book_id: i32, nb_available: i32) -> AppResult<()> {
        sqlx::query("UPDATE books SET nb_available = $1 WHERE id = $2")
            .bind(nb_available)
            .bind(book_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                book_id, loaner_name, loaner_contact, loaner_card,
                start_date, due_date, active, nb_renews, late_days, penalty, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, 0, 0, 0, $7)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(&loan.loaner_name)
        .bind(&loan.loaner_contact)
        .bind(loan.loaner_card)
        .bind(loan.start_date)
        .bind(loan.due_date)
        .bind(&loan.notes)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn apply_renewal(
        &mut self,
        loan_id: i32,
        due_date: NaiveDate,
        nb_renews: i16,
    ) -> AppResult<()> {
        sqlx::query("UPDATE loans SET due_date = $1, nb_renews = $2 WHERE id = $3")
            .bind(due_date)
            .bind(nb_renews)
            .bind(loan_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn apply_return(
        &mut self,
        loan_id: i32,
        returned_date: NaiveDate,
        late_days: i32,
        penalty: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE loans
            SET returned_date = $1, active = FALSE, late_days = $2, penalty = $3
            WHERE id = $4
            "#,
        )
        .bind(returned_date)
        .bind(late_days)
        .bind(penalty)
        .bind(loan_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn count_active_loans_for(&mut self, contact: &str, card: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE active AND (loaner_contact = $1 OR loaner_card = $2)",
        )
        .bind(contact)
        .bind(card)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
