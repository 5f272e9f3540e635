use crate::config::LibraryConfig;
use crate::domain::book::{Book, Isbn, StockMovement};
use crate::domain::fine::Fine;
use crate::domain::loan::{Loan, LoanId, NewLoan};
use crate::domain::partner::{NewPartner, Partner, PartnerId};
use crate::domain::user::{StaffRole, User, UserId};
use crate::domain::ports::{
    BookCatalog, LibraryStore, LoanRecords, LoanReports, PartnerDirectory, StaffDirectory,
    StockLedger, UnitOfWork,
};
use crate::error::{LibraryError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS books (
        isbn             TEXT PRIMARY KEY NOT NULL,
        title            TEXT NOT NULL,
        author           TEXT NOT NULL,
        category         TEXT NOT NULL,
        reference_price  TEXT NOT NULL,
        total_copies     INTEGER NOT NULL CHECK (total_copies >= 0),
        available_copies INTEGER NOT NULL
                         CHECK (available_copies >= 0 AND available_copies <= total_copies),
        is_active        BOOLEAN NOT NULL DEFAULT 1,
        created_at       DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS partners (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        name      TEXT NOT NULL,
        email     TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS loans (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        book_isbn   TEXT NOT NULL REFERENCES books (isbn),
        partner_id  INTEGER NOT NULL REFERENCES partners (id),
        loan_date   DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        due_date    DATE NOT NULL,
        return_date DATE,
        fine        TEXT,
        is_returned BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_loans_open_by_book ON loans (book_isbn, is_returned)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role          TEXT NOT NULL CHECK (role IN ('ADMIN', 'ASSISTANT')),
        is_active     BOOLEAN NOT NULL DEFAULT 1,
        created_at    DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];

// The bound check and the increment are a single statement so that two
// transactions racing for the last copy cannot both succeed.
const ADJUST_STOCK_SQL: &str = r#"
    UPDATE books
    SET available_copies = available_copies + ?1
    WHERE isbn = ?2
      AND available_copies + ?1 >= 0
      AND available_copies + ?1 <= total_copies
"#;

const INSERT_LOAN_SQL: &str = r#"
    INSERT INTO loans (book_isbn, partner_id, due_date)
    VALUES (?1, ?2, ?3)
    RETURNING id, book_isbn, partner_id, loan_date, due_date, return_date, fine, is_returned
"#;

const FINALIZE_RETURN_SQL: &str = r#"
    UPDATE loans
    SET return_date = ?1, fine = ?2, is_returned = 1
    WHERE id = ?3 AND is_returned = 0
"#;

const SELECT_BOOK_SQL: &str = r#"
    SELECT isbn, title, author, category, reference_price, total_copies, available_copies, is_active
    FROM books
"#;

const INSERT_BOOK_SQL: &str = r#"
    INSERT INTO books
        (isbn, title, author, category, reference_price, total_copies, available_copies, is_active)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

// Right-hand sides see the row as it was before the update, so the available
// count keeps the number of copies on loan unchanged.
const UPDATE_BOOK_SQL: &str = r#"
    UPDATE books
    SET title = ?1,
        author = ?2,
        category = ?3,
        reference_price = ?4,
        available_copies = ?5 - (total_copies - available_copies),
        total_copies = ?5
    WHERE isbn = ?6
      AND ?5 >= total_copies - available_copies
"#;

const SELECT_PARTNER_SQL: &str = "SELECT id, name, email, is_active FROM partners";

const SELECT_USER_SQL: &str = "SELECT id, username, password_hash, role, is_active FROM users";

const SELECT_LOAN_SQL: &str = r#"
    SELECT id, book_isbn, partner_id, loan_date, due_date, return_date, fine, is_returned
    FROM loans
"#;

#[derive(FromRow)]
struct BookRow {
    isbn: String,
    title: String,
    author: String,
    category: String,
    reference_price: String,
    total_copies: i64,
    available_copies: i64,
    is_active: bool,
}

impl TryFrom<BookRow> for Book {
    type Error = LibraryError;

    fn try_from(row: BookRow) -> Result<Self> {
        Ok(Self {
            isbn: Isbn::new(row.isbn)?,
            title: row.title,
            author: row.author,
            category: row.category,
            reference_price: parse_decimal("reference_price", &row.reference_price)?,
            total_copies: row.total_copies,
            available_copies: row.available_copies,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct PartnerRow {
    id: i64,
    name: String,
    email: String,
    is_active: bool,
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        Self {
            id: PartnerId(row.id),
            name: row.name,
            email: row.email,
            is_active: row.is_active,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    is_active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = LibraryError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: UserId(row.id),
            username: row.username,
            password_hash: row.password_hash,
            role: row.role.parse::<StaffRole>()?,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct LoanRow {
    id: i64,
    book_isbn: String,
    partner_id: i64,
    loan_date: NaiveDateTime,
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
    fine: Option<String>,
    is_returned: bool,
}

impl TryFrom<LoanRow> for Loan {
    type Error = LibraryError;

    fn try_from(row: LoanRow) -> Result<Self> {
        let fine = row
            .fine
            .as_deref()
            .map(|raw| parse_decimal("fine", raw).and_then(Fine::new))
            .transpose()?;

        Ok(Self {
            id: LoanId(row.id),
            book_isbn: Isbn::new(row.book_isbn)?,
            partner_id: PartnerId(row.partner_id),
            loan_date: row.loan_date,
            due_date: row.due_date,
            return_date: row.return_date,
            fine,
            is_returned: row.is_returned,
        })
    }
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| {
        LibraryError::Storage(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
}

fn into_books(rows: Vec<BookRow>) -> Result<Vec<Book>> {
    rows.into_iter().map(Book::try_from).collect()
}

fn into_loans(rows: Vec<LoanRow>) -> Result<Vec<Loan>> {
    rows.into_iter().map(Loan::try_from).collect()
}

/// A relational store backed by SQLite through a `sqlx` connection pool.
///
/// Reads run directly on the pool. Mutations that must be atomic go through
/// [`SqliteUnitOfWork`], which owns one pooled connection inside a transaction.
///
/// `Clone` shares the underlying pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `config.database_url` and
    /// ensures the schema exists.
    ///
    /// File databases use the WAL journal so that readers never block the
    /// writer, and wait up to the configured busy timeout for the write lock.
    pub async fn connect(config: &LibraryConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// A private in-memory database.
    ///
    /// The pool holds exactly one connection for its whole life, since the
    /// database disappears with its last connection. A unit of work therefore
    /// has to be closed before the store is read again.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Creates the tables and indexes that do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn select_books(&self, filter: &str, value: Option<&str>) -> Result<Vec<Book>> {
        let sql = format!("{SELECT_BOOK_SQL} {filter}");
        let mut query = sqlx::query_as::<_, BookRow>(&sql);
        if let Some(value) = value {
            query = query.bind(value);
        }
        into_books(query.fetch_all(&self.pool).await?)
    }

    async fn select_loans(&self, filter: &str, today: Option<NaiveDate>) -> Result<Vec<Loan>> {
        let sql = format!("{SELECT_LOAN_SQL} {filter}");
        let mut query = sqlx::query_as::<_, LoanRow>(&sql);
        if let Some(today) = today {
            query = query.bind(today);
        }
        into_loans(query.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl BookCatalog for SqliteStore {
    async fn find_book(&self, isbn: &Isbn) -> Result<Option<Book>> {
        let sql = format!("{SELECT_BOOK_SQL} WHERE isbn = ?1");
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(isbn.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Book::try_from).transpose()
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        self.select_books("ORDER BY isbn", None).await
    }

    async fn books_by_category(&self, category: &str) -> Result<Vec<Book>> {
        self.select_books("WHERE category = ?1 AND is_active = 1 ORDER BY isbn", Some(category))
            .await
    }

    async fn books_by_author(&self, author: &str) -> Result<Vec<Book>> {
        self.select_books("WHERE author = ?1 AND is_active = 1 ORDER BY isbn", Some(author))
            .await
    }

    async fn insert_book(&self, book: &Book) -> Result<()> {
        sqlx::query(INSERT_BOOK_SQL)
            .bind(book.isbn.as_str())
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.category)
            .bind(book.reference_price.to_string())
            .bind(book.total_copies)
            .bind(book.available_copies)
            .bind(book.is_active)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    LibraryError::DuplicateIsbn(book.isbn.clone())
                }
                other => LibraryError::from(other),
            })?;
        debug!(isbn = %book.isbn, "book inserted");
        Ok(())
    }

    async fn update_book(&self, book: &Book) -> Result<bool> {
        let result = sqlx::query(UPDATE_BOOK_SQL)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.category)
            .bind(book.reference_price.to_string())
            .bind(book.total_copies)
            .bind(book.isbn.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_book_active(&self, isbn: &Isbn, is_active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE books SET is_active = ?1 WHERE isbn = ?2")
            .bind(is_active)
            .bind(isbn.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PartnerDirectory for SqliteStore {
    async fn is_partner_active(&self, id: PartnerId) -> Result<bool> {
        let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM partners WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(active.unwrap_or(false))
    }

    async fn find_partner(&self, id: PartnerId) -> Result<Option<Partner>> {
        let sql = format!("{SELECT_PARTNER_SQL} WHERE id = ?1");
        let row = sqlx::query_as::<_, PartnerRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Partner::from))
    }

    async fn list_partners(&self) -> Result<Vec<Partner>> {
        let sql = format!("{SELECT_PARTNER_SQL} ORDER BY id");
        let rows = sqlx::query_as::<_, PartnerRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Partner::from).collect())
    }

    async fn insert_partner(&self, partner: &NewPartner) -> Result<Partner> {
        let row = sqlx::query_as::<_, PartnerRow>(
            "INSERT INTO partners (name, email) VALUES (?1, ?2) RETURNING id, name, email, is_active",
        )
        .bind(&partner.name)
        .bind(&partner.email)
        .fetch_one(&self.pool)
        .await?;
        debug!(partner_id = row.id, "partner inserted");
        Ok(row.into())
    }

    async fn update_partner(&self, partner: &Partner) -> Result<bool> {
        let result =
            sqlx::query("UPDATE partners SET name = ?1, email = ?2, is_active = ?3 WHERE id = ?4")
                .bind(&partner.name)
                .bind(&partner.email)
                .bind(partner.is_active)
                .bind(partner.id.0)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl LoanReports for SqliteStore {
    async fn find_loan(&self, id: LoanId) -> Result<Option<Loan>> {
        let sql = format!("{SELECT_LOAN_SQL} WHERE id = ?1");
        let row = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Loan::try_from).transpose()
    }

    async fn all_loans(&self) -> Result<Vec<Loan>> {
        self.select_loans("ORDER BY id", None).await
    }

    async fn active_loans(&self) -> Result<Vec<Loan>> {
        self.select_loans("WHERE is_returned = 0 ORDER BY id", None)
            .await
    }

    async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<Loan>> {
        self.select_loans(
            "WHERE due_date < ?1 AND is_returned = 0 ORDER BY due_date, id",
            Some(today),
        )
        .await
    }

    async fn count_active_loans(&self, isbn: &Isbn) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM loans WHERE book_isbn = ?1 AND is_returned = 0",
        )
        .bind(isbn.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl StaffDirectory for SqliteStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER_SQL} WHERE id = ?1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER_SQL} WHERE username = ?1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("{SELECT_USER_SQL} ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: StaffRole,
    ) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)
            RETURNING id, username, password_hash, role, is_active
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| duplicate_username(e, username))?;
        debug!(user_id = row.id, "user inserted");
        User::try_from(row)
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET username = ?1, role = ?2, is_active = ?3 WHERE id = ?4")
                .bind(&user.username)
                .bind(user.role.as_str())
                .bind(user.is_active)
                .bind(user.id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| duplicate_username(e, &user.username))?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(password_hash)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn duplicate_username(err: sqlx::Error, username: &str) -> LibraryError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LibraryError::DuplicateUsername(username.to_string())
        }
        other => LibraryError::from(other),
    }
}

#[async_trait]
impl LibraryStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }
}

/// One open SQLite transaction.
///
/// Dropping it without calling [`UnitOfWork::commit`] rolls the transaction
/// back when its connection returns to the pool.
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StockLedger for SqliteUnitOfWork {
    async fn adjust_stock(&mut self, isbn: &Isbn, movement: StockMovement) -> Result<bool> {
        let result = sqlx::query(ADJUST_STOCK_SQL)
            .bind(movement.delta())
            .bind(isbn.as_str())
            .execute(&mut *self.tx)
            .await?;
        let applied = result.rows_affected() == 1;
        debug!(%isbn, ?movement, applied, "stock adjustment");
        Ok(applied)
    }
}

#[async_trait]
impl LoanRecords for SqliteUnitOfWork {
    async fn insert_loan(&mut self, loan: &NewLoan) -> Result<Loan> {
        let row = sqlx::query_as::<_, LoanRow>(INSERT_LOAN_SQL)
            .bind(loan.book_isbn.as_str())
            .bind(loan.partner_id.0)
            .bind(loan.due_date)
            .fetch_one(&mut *self.tx)
            .await?;
        Loan::try_from(row)
    }

    async fn finalize_return(
        &mut self,
        loan_id: LoanId,
        return_date: NaiveDate,
        fine: Fine,
    ) -> Result<bool> {
        let result = sqlx::query(FINALIZE_RETURN_SQL)
            .bind(return_date)
            .bind(fine.value().to_string())
            .bind(loan_id.0)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        let SqliteUnitOfWork { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let SqliteUnitOfWork { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
