#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use library_ledger::config::LibraryConfig;
use library_ledger::domain::book::{Book, Isbn};
use library_ledger::domain::loan::{Loan, LoanId};
use library_ledger::domain::partner::{NewPartner, Partner, PartnerId};
use library_ledger::domain::ports::{
    BookCatalog, LibraryStore, LoanReports, PartnerDirectory, StaffDirectory, UnitOfWork,
};
use library_ledger::domain::user::{StaffRole, User, UserId};
use library_ledger::error::Result;
use library_ledger::infrastructure::sqlite::SqliteStore;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn isbn(value: &str) -> Isbn {
    Isbn::new(value).unwrap()
}

pub fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("library.db").display())
}

/// An on-disk store with a pool wide enough for concurrent callers.
pub async fn file_store(dir: &Path) -> Arc<SqliteStore> {
    let mut config = LibraryConfig::with_database_url(database_url(dir));
    config.max_connections = 8;
    Arc::new(SqliteStore::connect(&config).await.unwrap())
}

pub async fn seed_book(store: &SqliteStore, value: &str, copies: i64) -> Isbn {
    let book = Book::new(isbn(value), "Title", "Author", "Category", dec!(10.00), copies);
    store.insert_book(&book).await.unwrap();
    book.isbn
}

pub async fn seed_partner(store: &SqliteStore, name: &str) -> PartnerId {
    store
        .insert_partner(&NewPartner::new(name, format!("{name}@example.org")))
        .await
        .unwrap()
        .id
}

/// `total - available` must equal the number of open loans, within bounds.
pub async fn assert_stock_consistent(store: &SqliteStore, isbn: &Isbn) {
    let book = store.find_book(isbn).await.unwrap().unwrap();
    let open = store.count_active_loans(isbn).await.unwrap();
    assert!(book.available_copies >= 0, "negative stock: {book:?}");
    assert!(book.available_copies <= book.total_copies, "stock over total: {book:?}");
    assert_eq!(book.total_copies - book.available_copies, open, "{book:?}");
}

/// Delegates to a real store but answers the coordinator's pre-checks with
/// outdated data, as if another caller had changed the rows in between.
pub struct StaleStore {
    inner: Arc<SqliteStore>,
}

impl StaleStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BookCatalog for StaleStore {
    async fn find_book(&self, isbn: &Isbn) -> Result<Option<Book>> {
        let book = self.inner.find_book(isbn).await?;
        Ok(book.map(|book| Book {
            available_copies: book.total_copies,
            ..book
        }))
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        self.inner.list_books().await
    }

    async fn books_by_category(&self, category: &str) -> Result<Vec<Book>> {
        self.inner.books_by_category(category).await
    }

    async fn books_by_author(&self, author: &str) -> Result<Vec<Book>> {
        self.inner.books_by_author(author).await
    }

    async fn insert_book(&self, book: &Book) -> Result<()> {
        self.inner.insert_book(book).await
    }

    async fn update_book(&self, book: &Book) -> Result<bool> {
        self.inner.update_book(book).await
    }

    async fn set_book_active(&self, isbn: &Isbn, is_active: bool) -> Result<bool> {
        self.inner.set_book_active(isbn, is_active).await
    }
}

#[async_trait]
impl PartnerDirectory for StaleStore {
    async fn is_partner_active(&self, id: PartnerId) -> Result<bool> {
        self.inner.is_partner_active(id).await
    }

    async fn find_partner(&self, id: PartnerId) -> Result<Option<Partner>> {
        self.inner.find_partner(id).await
    }

    async fn list_partners(&self) -> Result<Vec<Partner>> {
        self.inner.list_partners().await
    }

    async fn insert_partner(&self, partner: &NewPartner) -> Result<Partner> {
        self.inner.insert_partner(partner).await
    }

    async fn update_partner(&self, partner: &Partner) -> Result<bool> {
        self.inner.update_partner(partner).await
    }
}

#[async_trait]
impl LoanReports for StaleStore {
    async fn find_loan(&self, id: LoanId) -> Result<Option<Loan>> {
        let loan = self.inner.find_loan(id).await?;
        Ok(loan.map(|loan| Loan {
            is_returned: false,
            return_date: None,
            fine: None,
            ..loan
        }))
    }

    async fn all_loans(&self) -> Result<Vec<Loan>> {
        self.inner.all_loans().await
    }

    async fn active_loans(&self) -> Result<Vec<Loan>> {
        self.inner.active_loans().await
    }

    async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<Loan>> {
        self.inner.overdue_loans(today).await
    }

    async fn count_active_loans(&self, isbn: &Isbn) -> Result<i64> {
        self.inner.count_active_loans(isbn).await
    }
}

#[async_trait]
impl StaffDirectory for StaleStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.inner.list_users().await
    }

    async fn insert_user(&self, username: &str, password_hash: &str, role: StaffRole) -> Result<User> {
        self.inner.insert_user(username, password_hash, role).await
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        self.inner.update_user(user).await
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<bool> {
        self.inner.update_password_hash(id, password_hash).await
    }
}

#[async_trait]
impl LibraryStore for StaleStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        self.inner.begin().await
    }
}
