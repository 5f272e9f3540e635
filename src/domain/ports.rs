//! Storage ports.
//!
//! Two capability tiers: the read traits manage their own short-lived access to
//! the store, while the transactional traits are only reachable through an open
//! [`UnitOfWork`].

use super::book::{Book, Isbn, StockMovement};
use super::fine::Fine;
use super::loan::{Loan, LoanId, NewLoan};
use super::partner::{NewPartner, Partner, PartnerId};
use super::user::{StaffRole, User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Bounded stock updates, executed inside an enclosing unit of work.
#[async_trait]
pub trait StockLedger: Send {
    /// Applies `movement` to the book's available copies as one conditional
    /// statement. Returns `false` when the book does not exist or the result
    /// would leave `0..=total_copies`.
    async fn adjust_stock(&mut self, isbn: &Isbn, movement: StockMovement) -> Result<bool>;
}

/// Loan mutations, executed inside an enclosing unit of work.
#[async_trait]
pub trait LoanRecords: Send {
    /// Inserts an open loan; the store assigns `id` and `loan_date`.
    async fn insert_loan(&mut self, loan: &NewLoan) -> Result<Loan>;

    /// Marks an open loan as returned. Returns `false` when the loan does not
    /// exist or was already returned.
    async fn finalize_return(
        &mut self,
        loan_id: LoanId,
        return_date: NaiveDate,
        fine: Fine,
    ) -> Result<bool>;
}

/// An atomic group of mutations, closed exactly once.
///
/// Dropping an open unit of work discards its changes.
#[async_trait]
pub trait UnitOfWork: StockLedger + LoanRecords {
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait BookCatalog: Send + Sync {
    async fn find_book(&self, isbn: &Isbn) -> Result<Option<Book>>;
    async fn list_books(&self) -> Result<Vec<Book>>;
    async fn books_by_category(&self, category: &str) -> Result<Vec<Book>>;
    async fn books_by_author(&self, author: &str) -> Result<Vec<Book>>;
    async fn insert_book(&self, book: &Book) -> Result<()>;
    /// Updates the descriptive fields and the total copy count, re-deriving the
    /// available count from the copies currently out on loan. Returns `false`
    /// when the book does not exist or `book.total_copies` would not cover them.
    async fn update_book(&self, book: &Book) -> Result<bool>;
    async fn set_book_active(&self, isbn: &Isbn, is_active: bool) -> Result<bool>;
}

#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// An unknown partner is reported as inactive.
    async fn is_partner_active(&self, id: PartnerId) -> Result<bool>;
    async fn find_partner(&self, id: PartnerId) -> Result<Option<Partner>>;
    async fn list_partners(&self) -> Result<Vec<Partner>>;
    async fn insert_partner(&self, partner: &NewPartner) -> Result<Partner>;
    async fn update_partner(&self, partner: &Partner) -> Result<bool>;
}

#[async_trait]
pub trait LoanReports: Send + Sync {
    async fn find_loan(&self, id: LoanId) -> Result<Option<Loan>>;
    async fn all_loans(&self) -> Result<Vec<Loan>>;
    async fn active_loans(&self) -> Result<Vec<Loan>>;
    /// Open loans whose due date is before `today`.
    async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<Loan>>;
    async fn count_active_loans(&self, isbn: &Isbn) -> Result<i64>;
}

/// Staff accounts. Passwords only ever reach the store already hashed.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: StaffRole,
    ) -> Result<User>;
    /// Updates username, role and activity. Returns `false` for an unknown id.
    async fn update_user(&self, user: &User) -> Result<bool>;
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<bool>;
}

/// The relational backing store.
#[async_trait]
pub trait LibraryStore: BookCatalog + PartnerDirectory + LoanReports + StaffDirectory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

pub type LibraryStoreRef = Arc<dyn LibraryStore>;
