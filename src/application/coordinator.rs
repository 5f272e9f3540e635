use crate::domain::book::{Isbn, StockMovement};
use crate::domain::fine::{Fine, FineRule, days_late};
use crate::domain::loan::{Loan, LoanId, NewLoan, ReturnReceipt};
use crate::domain::partner::PartnerId;
use crate::domain::ports::{LibraryStoreRef, UnitOfWork};
use crate::error::{LibraryError, Result};
use chrono::NaiveDate;
use tracing::{info, instrument, warn};

/// Orchestrates the loan lifecycle.
///
/// `LoanCoordinator` runs every loan and return as one unit of work spanning
/// the loan records and the book's stock counters. The checks made before the
/// unit of work opens are only a fast path: the conditional updates inside it
/// are authoritative, so concurrent callers (threads or processes) racing for
/// the same copy are serialised by the store rather than by this type.
pub struct LoanCoordinator {
    store: LibraryStoreRef,
    fine_rule: FineRule,
}

impl LoanCoordinator {
    /// Creates a new `LoanCoordinator`.
    ///
    /// # Arguments
    ///
    /// * `store` - The relational store holding books, partners and loans.
    /// * `fine_rule` - The policy used to charge late returns.
    pub fn new(store: LibraryStoreRef, fine_rule: FineRule) -> Self {
        Self { store, fine_rule }
    }

    pub fn fine_rule(&self) -> FineRule {
        self.fine_rule
    }

    /// Lends one copy of `isbn` to `partner_id` until `due_date`.
    ///
    /// Inserts the loan and takes the copy off the shelf atomically. Fails with
    /// `PartnerInvalid` for an unknown or inactive partner and with
    /// `InsufficientStock` when no copy is available, including when another
    /// caller took the last copy after the pre-check.
    #[instrument(skip_all, fields(%isbn, %partner_id), err)]
    pub async fn register_loan(
        &self,
        isbn: &Isbn,
        partner_id: PartnerId,
        due_date: NaiveDate,
    ) -> Result<Loan> {
        if !self.store.is_partner_active(partner_id).await? {
            return Err(LibraryError::PartnerInvalid(partner_id));
        }

        match self.store.find_book(isbn).await? {
            Some(book) if book.has_stock() => {}
            book => {
                return Err(LibraryError::InsufficientStock {
                    isbn: isbn.clone(),
                    available: book.map_or(0, |book| book.available_copies),
                });
            }
        }

        let request = NewLoan {
            book_isbn: isbn.clone(),
            partner_id,
            due_date,
        };

        let mut uow = self.store.begin().await?;
        let outcome = checkout(&mut *uow, &request).await;
        let loan = settle(uow, outcome).await?;

        info!(loan_id = %loan.id, %due_date, "loan registered");
        Ok(loan)
    }

    /// Closes an open loan on `return_date`, charging the fine and putting the
    /// copy back on the shelf atomically.
    ///
    /// A loan is returned at most once: a second call fails with
    /// `AlreadyReturned`, or with `Consistency` when it raced the first one.
    #[instrument(skip_all, fields(%loan_id), err)]
    pub async fn process_return(
        &self,
        loan_id: LoanId,
        return_date: NaiveDate,
    ) -> Result<ReturnReceipt> {
        let loan = self
            .store
            .find_loan(loan_id)
            .await?
            .ok_or(LibraryError::LoanNotFound(loan_id))?;
        if loan.is_returned {
            return Err(LibraryError::AlreadyReturned(loan_id));
        }

        let fine = self.fine_rule.calculate(loan.due_date, return_date);

        let mut uow = self.store.begin().await?;
        let outcome = check_in(&mut *uow, &loan, return_date, fine).await;
        settle(uow, outcome).await?;

        info!(isbn = %loan.book_isbn, %fine, "loan returned");
        Ok(ReturnReceipt {
            loan_id,
            book_isbn: loan.book_isbn,
            return_date,
            days_late: days_late(loan.due_date, return_date),
            fine,
        })
    }

    /// The fine for returning a loan due on `due_date` on `return_date`.
    pub fn calculate_fine(&self, due_date: NaiveDate, return_date: NaiveDate) -> Fine {
        self.fine_rule.calculate(due_date, return_date)
    }

    pub async fn find_loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        self.store.find_loan(loan_id).await
    }

    pub async fn active_loans(&self) -> Result<Vec<Loan>> {
        self.store.active_loans().await
    }

    /// Open loans whose due date is before `today`.
    pub async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<Loan>> {
        self.store.overdue_loans(today).await
    }
}

async fn checkout(uow: &mut dyn UnitOfWork, request: &NewLoan) -> Result<Loan> {
    let loan = uow.insert_loan(request).await?;

    if !uow
        .adjust_stock(&request.book_isbn, StockMovement::Checkout)
        .await?
    {
        return Err(LibraryError::InsufficientStock {
            isbn: request.book_isbn.clone(),
            available: 0,
        });
    }

    Ok(loan)
}

async fn check_in(
    uow: &mut dyn UnitOfWork,
    loan: &Loan,
    return_date: NaiveDate,
    fine: Fine,
) -> Result<()> {
    if !uow.finalize_return(loan.id, return_date, fine).await? {
        return Err(LibraryError::Consistency(format!(
            "loan {} was closed concurrently",
            loan.id
        )));
    }

    if !uow
        .adjust_stock(&loan.book_isbn, StockMovement::Return)
        .await?
    {
        return Err(LibraryError::Consistency(format!(
            "stock of ISBN '{}' could not take back loan {}",
            loan.book_isbn, loan.id
        )));
    }

    Ok(())
}

/// Commits on success and rolls back on failure, closing `uow` either way.
///
/// The error in `outcome` is returned even if the rollback itself fails.
async fn settle<T: Send>(uow: Box<dyn UnitOfWork>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            warn!(error = %err, "unit of work rolled back");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::Book;
    use crate::domain::partner::NewPartner;
    use crate::domain::ports::{BookCatalog, LibraryStore, LoanReports, PartnerDirectory};
    use crate::infrastructure::sqlite::SqliteStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn isbn(value: &str) -> Isbn {
        Isbn::new(value).unwrap()
    }

    async fn setup(copies: i64) -> (Arc<SqliteStore>, LoanCoordinator, PartnerId) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store
            .insert_book(&Book::new(isbn("X"), "Dune", "Herbert", "Sci-Fi", dec!(10), copies))
            .await
            .unwrap();
        let partner = store
            .insert_partner(&NewPartner::new("Ada", "ada@example.org"))
            .await
            .unwrap();

        let coordinator = LoanCoordinator::new(store.clone(), FineRule::default());
        (store, coordinator, partner.id)
    }

    async fn available(store: &SqliteStore) -> i64 {
        store
            .find_book(&isbn("X"))
            .await
            .unwrap()
            .unwrap()
            .available_copies
    }

    #[tokio::test]
    async fn test_loan_and_return_end_to_end() {
        let (store, coordinator, partner_id) = setup(3).await;

        let loan = coordinator
            .register_loan(&isbn("X"), partner_id, date(2024, 2, 1))
            .await
            .unwrap();
        assert!(!loan.is_returned);
        assert_eq!(available(&store).await, 2);

        let receipt = coordinator
            .process_return(loan.id, date(2024, 2, 5))
            .await
            .unwrap();
        assert_eq!(receipt.fine.value(), dec!(2.00));
        assert_eq!(receipt.days_late, 4);
        assert_eq!(available(&store).await, 3);

        let stored = store.find_loan(loan.id).await.unwrap().unwrap();
        assert!(stored.is_returned);
        assert_eq!(stored.return_date, Some(date(2024, 2, 5)));
        assert_eq!(stored.fine.map(|f| f.value()), Some(dec!(2.00)));
    }

    #[tokio::test]
    async fn test_inactive_partner_is_rejected() {
        let (store, coordinator, partner_id) = setup(3).await;
        let mut partner = store.find_partner(partner_id).await.unwrap().unwrap();
        partner.is_active = false;
        store.update_partner(&partner).await.unwrap();

        let result = coordinator
            .register_loan(&isbn("X"), partner_id, date(2024, 2, 1))
            .await;

        assert!(matches!(result, Err(LibraryError::PartnerInvalid(id)) if id == partner_id));
        assert_eq!(available(&store).await, 3);
    }

    #[tokio::test]
    async fn test_unknown_partner_is_rejected() {
        let (_store, coordinator, _) = setup(3).await;
        let result = coordinator
            .register_loan(&isbn("X"), PartnerId(404), date(2024, 2, 1))
            .await;
        assert!(matches!(result, Err(LibraryError::PartnerInvalid(_))));
    }

    #[tokio::test]
    async fn test_out_of_stock_is_rejected() {
        let (store, coordinator, partner_id) = setup(1).await;

        coordinator
            .register_loan(&isbn("X"), partner_id, date(2024, 2, 1))
            .await
            .unwrap();
        let result = coordinator
            .register_loan(&isbn("X"), partner_id, date(2024, 2, 1))
            .await;

        assert!(matches!(
            result,
            Err(LibraryError::InsufficientStock { available: 0, .. })
        ));
        assert_eq!(store.active_loans().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_book_is_insufficient_stock() {
        let (_store, coordinator, partner_id) = setup(1).await;
        let result = coordinator
            .register_loan(&isbn("missing"), partner_id, date(2024, 2, 1))
            .await;
        assert!(matches!(result, Err(LibraryError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn test_return_of_unknown_loan() {
        let (_store, coordinator, _) = setup(1).await;
        let result = coordinator.process_return(LoanId(77), date(2024, 2, 1)).await;
        assert!(matches!(result, Err(LibraryError::LoanNotFound(LoanId(77)))));
    }

    #[tokio::test]
    async fn test_double_return_is_rejected() {
        let (store, coordinator, partner_id) = setup(2).await;
        let loan = coordinator
            .register_loan(&isbn("X"), partner_id, date(2024, 2, 1))
            .await
            .unwrap();

        coordinator
            .process_return(loan.id, date(2024, 1, 30))
            .await
            .unwrap();
        let second = coordinator.process_return(loan.id, date(2024, 2, 3)).await;

        assert!(matches!(second, Err(LibraryError::AlreadyReturned(_))));
        assert_eq!(available(&store).await, 2);
        let stored = store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(stored.fine, Some(Fine::ZERO));
        assert_eq!(stored.return_date, Some(date(2024, 1, 30)));
    }

    #[tokio::test]
    async fn test_reports() {
        let (_store, coordinator, partner_id) = setup(3).await;
        let first = coordinator
            .register_loan(&isbn("X"), partner_id, date(2024, 1, 10))
            .await
            .unwrap();
        coordinator
            .register_loan(&isbn("X"), partner_id, date(2024, 3, 10))
            .await
            .unwrap();

        assert_eq!(coordinator.active_loans().await.unwrap().len(), 2);
        let overdue = coordinator.overdue_loans(date(2024, 2, 1)).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, first.id);

        coordinator
            .process_return(first.id, date(2024, 2, 1))
            .await
            .unwrap();
        assert!(coordinator.overdue_loans(date(2024, 2, 1)).await.unwrap().is_empty());
        assert_eq!(
            coordinator.find_loan(first.id).await.unwrap().unwrap().fine,
            Some(coordinator.calculate_fine(date(2024, 1, 10), date(2024, 2, 1)))
        );
    }

    #[tokio::test]
    async fn test_custom_fine_rule() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let coordinator = LoanCoordinator::new(store, FineRule::new(dec!(1.00)).unwrap());
        assert_eq!(
            coordinator
                .calculate_fine(date(2024, 1, 10), date(2024, 1, 15))
                .value(),
            dec!(5.00)
        );
    }

    #[tokio::test]
    async fn test_begin_is_available_through_trait_object() {
        let (store, _coordinator, _) = setup(1).await;
        let uow = LibraryStore::begin(store.as_ref()).await.unwrap();
        uow.rollback().await.unwrap();
    }
}
