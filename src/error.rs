use crate::domain::book::Isbn;
use crate::domain::loan::LoanId;
use crate::domain::partner::PartnerId;
use crate::domain::user::UserId;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum LibraryError {
    #[error("The partner with ID {0} is inactive or does not exist")]
    #[diagnostic(code(library::partner_invalid))]
    PartnerInvalid(PartnerId),

    #[error("Insufficient stock for ISBN '{isbn}'. Available: {available}")]
    #[diagnostic(code(library::insufficient_stock))]
    InsufficientStock { isbn: Isbn, available: i64 },

    #[error("Loan ID {0} not found")]
    #[diagnostic(code(library::loan_not_found))]
    LoanNotFound(LoanId),

    #[error("Loan ID {0} is already returned")]
    #[diagnostic(code(library::already_returned))]
    AlreadyReturned(LoanId),

    #[error("Data consistency error: {0}")]
    #[diagnostic(
        code(library::consistency),
        help("no changes were applied; the request may be retried")
    )]
    Consistency(String),

    #[error("Book with ISBN '{0}' not found")]
    #[diagnostic(code(library::book_not_found))]
    BookNotFound(Isbn),

    #[error("Partner with ID {0} not found")]
    #[diagnostic(code(library::partner_not_found))]
    PartnerNotFound(PartnerId),

    #[error("The ISBN '{0}' already exists in the system")]
    #[diagnostic(code(library::duplicate_isbn))]
    DuplicateIsbn(Isbn),

    #[error("The username '{0}' is already in use")]
    #[diagnostic(code(library::duplicate_username))]
    DuplicateUsername(String),

    #[error("User with ID {0} not found")]
    #[diagnostic(code(library::user_not_found))]
    UserNotFound(UserId),

    #[error("Invalid username or password")]
    #[diagnostic(code(library::invalid_credentials))]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    #[diagnostic(code(library::validation))]
    ValidationError(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(library::storage))]
    Storage(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(library::csv))]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(library::json))]
    JsonError(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    #[diagnostic(code(library::password_hash))]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("IO error: {0}")]
    #[diagnostic(code(library::io))]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
