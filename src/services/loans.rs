//! Loan lifecycle engine and reporting facade.
//!
//! The engine owns the two-state machine (active, returned) and is the only
//! code that mutates loan records or book copy counts. Each operation runs
//! inside one store transaction: the precondition checks, the ledger
//! mutation and the loan write either all land or none do.
//!
//! Lateness and penalty are recorded once, at the terminal return
//! transition. There is no background clock; the reporting views re-derive
//! lateness on demand with the same predicate the engine uses, so a loan
//! shown as late is exactly one that a return at that instant would charge.

use std::sync::Arc;

use chrono::Duration;

use crate::{
    clock::Clock,
    config::LendingConfig,
    error::{AppError, AppResult},
    models::loan::{CheckoutLoan, Loan, LoanListParams, LoanQuery, NewLoan},
    repository::loans::{LoanStore, LoanStoreTx},
};

#[derive(Clone)]
pub struct LoanService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: LendingConfig,
}

impl<S: LoanStore> LoanService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: LendingConfig) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Check out one copy of a book to a loaner.
    ///
    /// The loaner's concurrent-loan count matches on contact address or
    /// card number, and is checked before availability so a loaner over the
    /// limit gets the same answer whatever the shelf state.
    pub async fn checkout(&self, request: CheckoutLoan) -> AppResult<Loan> {
        let start_date = request.start_date.unwrap_or_else(|| self.clock.today());

        let mut tx = self.store.begin().await?;

        let mut book = tx
            .get_book(request.book_id)
            .await?
            .ok_or(AppError::BookNotFound(request.book_id))?;

        let limit = self.policy.max_loans_per_loaner;
        let current = tx
            .count_active_loans_for(&request.loaner_contact, request.loaner_card)
            .await?;
        if current >= limit as i64 {
            return Err(AppError::BorrowLimitExceeded { limit, current });
        }

        book.reserve_copy()?;
        tx.save_book_copies(book.id, book.nb_available).await?;

        let due_date = start_date + Duration::days(self.policy.loan_period_days);
        let loan = tx
            .insert_loan(&NewLoan {
                book_id: book.id,
                loaner_name: request.loaner_name,
                loaner_contact: request.loaner_contact,
                loaner_card: request.loaner_card,
                start_date,
                due_date,
                notes: request.notes,
            })
            .await?;

        tx.commit().await?;

        tracing::info!(loan_id = loan.id, book_id = book.id, "book checked out");
        Ok(loan)
    }

    /// Extend an active loan's due date. Allowed at most
    /// `max_renewals` times per loan; no inventory change.
    pub async fn renew_loan(&self, loan_id: i32) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;

        let mut loan = tx
            .get_loan(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound(loan_id))?;

        if !loan.active {
            return Err(AppError::AlreadyReturned { loan_id });
        }
        if loan.nb_renews >= self.policy.max_renewals {
            return Err(AppError::RenewalLimitExceeded {
                loan_id,
                max: self.policy.max_renewals,
            });
        }

        loan.due_date += Duration::days(self.policy.renewal_period_days);
        loan.nb_renews += 1;
        tx.apply_renewal(loan_id, loan.due_date, loan.nb_renews)
            .await?;

        tx.commit().await?;

        tracing::info!(loan_id, nb_renews = loan.nb_renews, "loan renewed");
        Ok(loan)
    }

    /// Close a loan: record the return date, charge lateness, and put the
    /// copy back on the shelf. Terminal; a second return is rejected.
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;

        let mut loan = tx
            .get_loan(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound(loan_id))?;

        if !loan.active {
            return Err(AppError::AlreadyReturned { loan_id });
        }

        // A loan always references an existing book; a miss here means the
        // store was corrupted outside this request.
        let mut book = tx.get_book(loan.book_id).await?.ok_or_else(|| {
            AppError::InconsistentState(format!(
                "loan {} references missing book {}",
                loan_id, loan.book_id
            ))
        })?;

        book.release_copy()?;
        tx.save_book_copies(book.id, book.nb_available).await?;

        let returned_date = self.clock.today();
        let late_days = loan.late_days_at(returned_date);
        let penalty = late_days as i64 * self.policy.penalty_per_day;
        tx.apply_return(loan_id, returned_date, late_days, penalty)
            .await?;

        tx.commit().await?;

        loan.returned_date = Some(returned_date);
        loan.active = false;
        loan.late_days = late_days;
        loan.penalty = penalty;

        if late_days > 0 {
            tracing::info!(loan_id, late_days, penalty, "loan returned late");
        } else {
            tracing::info!(loan_id, "loan returned");
        }
        Ok(loan)
    }

    /// Get loan by ID
    pub async fn get_loan(&self, loan_id: i32) -> AppResult<Loan> {
        self.store
            .get_loan(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound(loan_id))
    }

    /// Reporting facade: classify, filter, sort and paginate loans.
    pub async fn list_loans(&self, params: &LoanListParams) -> AppResult<(Vec<Loan>, i64)> {
        let (_, page_size, offset) = super::page_params(
            params.page,
            params.page_size,
            self.policy.max_page_size,
        )?;

        let status = params
            .status
            .as_deref()
            .map(str::parse)
            .transpose()?;
        let sort_by = params
            .sort_by
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        let order = params
            .order
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();

        let query = LoanQuery {
            status,
            contact: params.contact.clone(),
            card: params.card,
            book_id: params.book_id,
            started_from: params.started_from,
            started_to: params.started_to,
            sort_by,
            order,
            as_of: self.clock.today(),
            offset,
            limit: page_size,
        };

        self.store.find_loans(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::models::book::Book;
    use crate::repository::memory::MemoryLoanStore;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Settable test clock shared with the service under test
    struct ManualClock(Mutex<NaiveDate>);

    impl ManualClock {
        fn starting(date: NaiveDate) -> Arc<Self> {
            Arc::new(Self(Mutex::new(date)))
        }

        fn set(&self, date: NaiveDate) {
            *self.0.lock().unwrap() = date;
        }
    }

    impl Clock for ManualClock {
        fn today(&self) -> NaiveDate {
            *self.0.lock().unwrap()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day0() -> NaiveDate {
        date(2024, 3, 1)
    }

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

    fn checkout_request(book_id: i32) -> CheckoutLoan {
        CheckoutLoan {
            book_id,
            loaner_name: "Jean Valjean".to_string(),
            loaner_contact: "24601 rue de Digne".to_string(),
            loaner_card: 24601,
            start_date: None,
            notes: None,
        }
    }

    fn service(
        store: &MemoryLoanStore,
        clock: Arc<dyn Clock>,
    ) -> LoanService<MemoryLoanStore> {
        LoanService::new(store.clone(), clock, LendingConfig::default())
    }

    fn setup() -> (MemoryLoanStore, Arc<ManualClock>, LoanService<MemoryLoanStore>) {
        let store = MemoryLoanStore::new();
        let clock = ManualClock::starting(day0());
        let svc = service(&store, clock.clone());
        (store, clock, svc)
    }

    #[tokio::test]
    async fn test_checkout_reserves_copy_and_sets_dates() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 2, 2));

        let loan = svc.checkout(checkout_request(1)).await.unwrap();

        assert!(loan.active);
        assert_eq!(loan.start_date, day0());
        assert_eq!(loan.due_date, day0() + Duration::days(28));
        assert_eq!(loan.nb_renews, 0);
        assert_eq!(loan.late_days, 0);
        assert_eq!(loan.penalty, 0);
        assert!(loan.returned_date.is_none());
        assert_eq!(store.book(1).unwrap().nb_available, 1);
    }

    #[tokio::test]
    async fn test_checkout_with_explicit_start_date() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 1, 1));

        let mut request = checkout_request(1);
        request.start_date = Some(date(2024, 2, 1));
        let loan = svc.checkout(request).await.unwrap();

        assert_eq!(loan.start_date, date(2024, 2, 1));
        assert_eq!(loan.due_date, date(2024, 2, 29));
    }

    #[tokio::test]
    async fn test_checkout_unknown_book() {
        let (_, _, svc) = setup();
        let err = svc.checkout(checkout_request(42)).await.unwrap_err();
        assert!(matches!(err, AppError::BookNotFound(42)));
    }

    #[tokio::test]
    async fn test_checkout_out_of_stock_leaves_no_trace() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 3, 0));

        let err = svc.checkout(checkout_request(1)).await.unwrap_err();

        assert!(matches!(err, AppError::OutOfStock { book_id: 1 }));
        assert_eq!(store.book(1).unwrap().nb_available, 0);
        let (loans, total) = store
            .find_loans(&any_query(day0()))
            .await
            .unwrap();
        assert!(loans.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_checkout_borrow_limit() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 10, 10));

        for _ in 0..5 {
            svc.checkout(checkout_request(1)).await.unwrap();
        }
        let err = svc.checkout(checkout_request(1)).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::BorrowLimitExceeded {
                limit: 5,
                current: 5
            }
        ));
        assert_eq!(store.book(1).unwrap().nb_available, 5);
    }

    #[tokio::test]
    async fn test_borrow_limit_wins_over_availability() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 5, 5));
        store.put_book(book(2, 1, 0));

        for _ in 0..5 {
            svc.checkout(checkout_request(1)).await.unwrap();
        }

        // Book 2 is out of stock, but the limit answer must not depend on it
        let err = svc.checkout(checkout_request(2)).await.unwrap_err();
        assert!(matches!(err, AppError::BorrowLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_borrow_limit_matches_contact_or_card() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 10, 10));

        for _ in 0..5 {
            svc.checkout(checkout_request(1)).await.unwrap();
        }

        // Same card, different contact
        let mut by_card = checkout_request(1);
        by_card.loaner_contact = "somewhere else".to_string();
        let err = svc.checkout(by_card).await.unwrap_err();
        assert!(matches!(err, AppError::BorrowLimitExceeded { .. }));

        // Same contact, different card
        let mut by_contact = checkout_request(1);
        by_contact.loaner_card = 999;
        let err = svc.checkout(by_contact).await.unwrap_err();
        assert!(matches!(err, AppError::BorrowLimitExceeded { .. }));

        // Different on both fields: a different loaner, allowed
        let mut other = checkout_request(1);
        other.loaner_contact = "somewhere else".to_string();
        other.loaner_card = 999;
        assert!(svc.checkout(other).await.is_ok());
    }

    #[tokio::test]
    async fn test_renew_extends_due_date_once() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 1, 1));
        let loan = svc.checkout(checkout_request(1)).await.unwrap();

        let renewed = svc.renew_loan(loan.id).await.unwrap();
        assert_eq!(renewed.due_date, day0() + Duration::days(28 + 14));
        assert_eq!(renewed.nb_renews, 1);

        let err = svc.renew_loan(loan.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::RenewalLimitExceeded { max: 1, .. }
        ));
        // Second attempt left the record untouched
        assert_eq!(
            store.loan(loan.id).unwrap().due_date,
            day0() + Duration::days(42)
        );
    }

    #[tokio::test]
    async fn test_renew_unknown_loan() {
        let (_, _, svc) = setup();
        let err = svc.renew_loan(7).await.unwrap_err();
        assert!(matches!(err, AppError::LoanNotFound(7)));
    }

    #[tokio::test]
    async fn test_renew_returned_loan() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 1, 1));
        let loan = svc.checkout(checkout_request(1)).await.unwrap();
        svc.return_loan(loan.id).await.unwrap();

        let err = svc.renew_loan(loan.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyReturned { .. }));
    }

    #[tokio::test]
    async fn test_return_on_time() {
        let (store, clock, svc) = setup();
        store.put_book(book(1, 1, 1));
        let loan = svc.checkout(checkout_request(1)).await.unwrap();

        clock.set(day0() + Duration::days(10));
        let returned = svc.return_loan(loan.id).await.unwrap();

        assert!(!returned.active);
        assert_eq!(returned.returned_date, Some(day0() + Duration::days(10)));
        assert_eq!(returned.late_days, 0);
        assert_eq!(returned.penalty, 0);
        assert_eq!(store.book(1).unwrap().nb_available, 1);
    }

    #[tokio::test]
    async fn test_return_late_charges_penalty() {
        // 28-day period at 50/day: returned on day 35 means 7 days late
        let (store, clock, svc) = setup();
        store.put_book(book(1, 1, 1));
        let loan = svc.checkout(checkout_request(1)).await.unwrap();

        clock.set(day0() + Duration::days(35));
        let returned = svc.return_loan(loan.id).await.unwrap();

        assert_eq!(returned.late_days, 7);
        assert_eq!(returned.penalty, 350);
        assert_eq!(store.loan(loan.id).unwrap().penalty, 350);
    }

    #[tokio::test]
    async fn test_return_twice_rejected_without_mutation() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 1, 1));
        let loan = svc.checkout(checkout_request(1)).await.unwrap();
        svc.return_loan(loan.id).await.unwrap();

        let err = svc.return_loan(loan.id).await.unwrap_err();

        assert!(matches!(err, AppError::AlreadyReturned { .. }));
        assert_eq!(store.book(1).unwrap().nb_available, 1);
    }

    #[tokio::test]
    async fn test_return_with_missing_book_rolls_back() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 1, 1));
        let loan = svc.checkout(checkout_request(1)).await.unwrap();

        // Corrupt the store behind the engine's back
        store.remove_book(1);

        let err = svc.return_loan(loan.id).await.unwrap_err();

        assert!(matches!(err, AppError::InconsistentState(_)));
        // The loan must still be open: nothing was committed
        assert!(store.loan(loan.id).unwrap().active);
    }

    #[tokio::test]
    async fn test_return_release_overflow_rolls_back() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 1, 1));
        let loan = svc.checkout(checkout_request(1)).await.unwrap();

        // All copies are already on the shelf: releasing one more is a
        // ledger defect, not a valid return
        store.put_book(book(1, 1, 1));

        let err = svc.return_loan(loan.id).await.unwrap_err();

        assert!(matches!(err, AppError::InconsistentState(_)));
        assert!(store.loan(loan.id).unwrap().active);
        assert_eq!(store.book(1).unwrap().nb_available, 1);
    }

    #[tokio::test]
    async fn test_checkout_return_round_trip_restores_availability() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 4, 3));

        let loan = svc.checkout(checkout_request(1)).await.unwrap();
        assert_eq!(store.book(1).unwrap().nb_available, 2);
        svc.return_loan(loan.id).await.unwrap();

        assert_eq!(store.book(1).unwrap().nb_available, 3);
    }

    #[tokio::test]
    async fn test_full_lifecycle_scenario() {
        // Checkout the last copy, renew, return on time
        let (store, clock, svc) = setup();
        store.put_book(book(1, 1, 1));

        let loan = svc.checkout(checkout_request(1)).await.unwrap();
        assert_eq!(store.book(1).unwrap().nb_available, 0);

        let renewed = svc.renew_loan(loan.id).await.unwrap();
        assert_eq!(renewed.due_date, loan.due_date + Duration::days(14));

        clock.set(renewed.due_date);
        let returned = svc.return_loan(loan.id).await.unwrap();
        assert!(!returned.active);
        assert_eq!(returned.late_days, 0);
        assert_eq!(returned.penalty, 0);
        assert_eq!(store.book(1).unwrap().nb_available, 1);
    }

    fn any_query(as_of: NaiveDate) -> LoanQuery {
        LoanQuery {
            status: None,
            contact: None,
            card: None,
            book_id: None,
            started_from: None,
            started_to: None,
            sort_by: Default::default(),
            order: Default::default(),
            as_of,
            offset: 0,
            limit: 100,
        }
    }

    fn list_params(status: &str) -> LoanListParams {
        LoanListParams {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_views_are_disjoint_and_late_is_subset_of_active() {
        let (store, clock, svc) = setup();
        store.put_book(book(1, 10, 10));

        // One on-time open loan, one overdue open loan, one closed loan
        let on_time = svc.checkout(checkout_request(1)).await.unwrap();
        let mut early = checkout_request(1);
        early.loaner_contact = "rue Plumet".to_string();
        early.loaner_card = 2;
        early.start_date = Some(day0() - Duration::days(60));
        let overdue = svc.checkout(early).await.unwrap();
        let mut third = checkout_request(1);
        third.loaner_contact = "rue de l'Homme Armé".to_string();
        third.loaner_card = 3;
        let closed = svc.checkout(third).await.unwrap();
        svc.return_loan(closed.id).await.unwrap();

        clock.set(day0() + Duration::days(1));

        let (active, _) = svc.list_loans(&list_params("active")).await.unwrap();
        let (late, _) = svc.list_loans(&list_params("late")).await.unwrap();
        let (history, _) = svc.list_loans(&list_params("history")).await.unwrap();

        let active_ids: Vec<i32> = active.iter().map(|l| l.id).collect();
        let late_ids: Vec<i32> = late.iter().map(|l| l.id).collect();
        let history_ids: Vec<i32> = history.iter().map(|l| l.id).collect();

        assert!(active_ids.contains(&on_time.id));
        assert!(active_ids.contains(&overdue.id));
        assert_eq!(late_ids, vec![overdue.id]);
        assert_eq!(history_ids, vec![closed.id]);
        for id in &late_ids {
            assert!(active_ids.contains(id));
        }
        for id in &history_ids {
            assert!(!active_ids.contains(id));
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_contact_card_and_book() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 5, 5));
        store.put_book(book(2, 5, 5));

        let first = svc.checkout(checkout_request(1)).await.unwrap();
        let mut other = checkout_request(2);
        other.loaner_contact = "rue Plumet".to_string();
        other.loaner_card = 7;
        let second = svc.checkout(other).await.unwrap();

        let by_contact = LoanListParams {
            contact: Some("rue Plumet".to_string()),
            ..Default::default()
        };
        let (loans, total) = svc.list_loans(&by_contact).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(loans[0].id, second.id);

        let by_card = LoanListParams {
            card: Some(24601),
            ..Default::default()
        };
        let (loans, _) = svc.list_loans(&by_card).await.unwrap();
        assert_eq!(loans[0].id, first.id);

        let by_book = LoanListParams {
            book_id: Some(2),
            ..Default::default()
        };
        let (loans, _) = svc.list_loans(&by_book).await.unwrap();
        assert_eq!(loans[0].id, second.id);
    }

    #[tokio::test]
    async fn test_list_sorts_and_paginates() {
        let (store, _, svc) = setup();
        store.put_book(book(1, 10, 10));

        for (i, days) in [30i64, 10, 20].iter().enumerate() {
            let mut request = checkout_request(1);
            request.loaner_contact = format!("contact-{}", i);
            request.loaner_card = i as i64 + 100;
            request.start_date = Some(day0() - Duration::days(*days));
            svc.checkout(request).await.unwrap();
        }

        let params = LoanListParams {
            sort_by: Some("start_date".to_string()),
            order: Some("desc".to_string()),
            page: Some(1),
            page_size: Some(2),
            ..Default::default()
        };
        let (loans, total) = svc.list_loans(&params).await.unwrap();

        assert_eq!(total, 3);
        assert_eq!(loans.len(), 2);
        assert!(loans[0].start_date >= loans[1].start_date);

        let page2 = LoanListParams {
            page: Some(2),
            ..params
        };
        let (rest, _) = svc.list_loans(&page2).await.unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn test_list_rejects_malformed_parameters() {
        let (_, _, svc) = setup();

        let bad_status = LoanListParams {
            status: Some("overdue".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            svc.list_loans(&bad_status).await.unwrap_err(),
            AppError::InvalidStatus(_)
        ));

        let bad_sort = LoanListParams {
            sort_by: Some("penalty".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            svc.list_loans(&bad_sort).await.unwrap_err(),
            AppError::InvalidSort(_)
        ));

        let bad_order = LoanListParams {
            order: Some("up".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            svc.list_loans(&bad_order).await.unwrap_err(),
            AppError::InvalidOrder(_)
        ));

        let bad_page = LoanListParams {
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            svc.list_loans(&bad_page).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_list_caps_page_size_at_policy_maximum() {
        let (store, _, _) = setup();
        store.put_book(book(1, 10, 10));
        let clock = ManualClock::starting(day0());
        let policy = LendingConfig {
            max_page_size: 2,
            ..Default::default()
        };
        let svc = LoanService::new(store.clone(), clock, policy);

        for i in 0..3i64 {
            let mut request = checkout_request(1);
            request.loaner_contact = format!("contact-{}", i);
            request.loaner_card = i + 100;
            svc.checkout(request).await.unwrap();
        }

        let params = LoanListParams {
            page_size: Some(50),
            ..Default::default()
        };
        let (loans, total) = svc.list_loans(&params).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(loans.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_clock_drives_due_date() {
        let store = MemoryLoanStore::new();
        store.put_book(book(1, 1, 1));

        let mut clock = MockClock::new();
        clock.expect_today().return_const(date(2024, 6, 1));

        let svc = LoanService::new(store, Arc::new(clock), LendingConfig::default());
        let loan = svc.checkout(checkout_request(1)).await.unwrap();

        assert_eq!(loan.start_date, date(2024, 6, 1));
        assert_eq!(loan.due_date, date(2024, 6, 29));
    }
}
