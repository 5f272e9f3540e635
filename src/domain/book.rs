use crate::error::{LibraryError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The unique key of a book.
///
/// Always trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LibraryError::ValidationError(
                "ISBN must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Isbn {
    type Error = LibraryError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Isbn {
    type Error = LibraryError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a single-copy stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMovement {
    /// One copy leaves the shelf (a loan).
    Checkout,
    /// One copy comes back (a return).
    Return,
}

impl StockMovement {
    /// The signed change applied to `available_copies`.
    pub fn delta(self) -> i64 {
        match self {
            StockMovement::Checkout => -1,
            StockMovement::Return => 1,
        }
    }
}

/// A catalog entry together with its stock counters.
///
/// `0 <= available_copies <= total_copies` holds for every committed book.
/// The difference between the two counters is the number of copies out on loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub category: String,
    pub reference_price: Decimal,
    pub total_copies: i64,
    pub available_copies: i64,
    pub is_active: bool,
}

impl Book {
    /// Creates an active book with every copy on the shelf.
    pub fn new(
        isbn: Isbn,
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
        reference_price: Decimal,
        total_copies: i64,
    ) -> Self {
        Self {
            isbn,
            title: title.into(),
            author: author.into(),
            category: category.into(),
            reference_price,
            total_copies,
            available_copies: total_copies,
            is_active: true,
        }
    }

    /// Number of copies currently out on loan.
    pub fn checked_out(&self) -> i64 {
        self.total_copies - self.available_copies
    }

    pub fn has_stock(&self) -> bool {
        self.available_copies >= 1
    }

    /// Checks the field rules a book must satisfy before it is stored.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LibraryError::ValidationError(
                "Title must not be empty".to_string(),
            ));
        }
        if self.reference_price < Decimal::ZERO {
            return Err(LibraryError::ValidationError(
                "Reference price must not be negative".to_string(),
            ));
        }
        if self.total_copies < 0 {
            return Err(LibraryError::ValidationError(
                "Total copies must not be negative".to_string(),
            ));
        }
        if self.available_copies < 0 {
            return Err(LibraryError::ValidationError(
                "Available copies must not be negative".to_string(),
            ));
        }
        if self.available_copies > self.total_copies {
            return Err(LibraryError::ValidationError(
                "Available copies cannot exceed total copies".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks that `new_total` still covers the copies currently on loan.
    pub fn ensure_total_covers_loans(&self, new_total: i64) -> Result<()> {
        let loaned = self.checked_out();
        if new_total < loaned {
            return Err(LibraryError::ValidationError(format!(
                "Cannot reduce total copies below {} (currently loaned out)",
                loaned
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_book(total: i64) -> Book {
        Book::new(
            Isbn::new("978-0131103627").unwrap(),
            "The C Programming Language",
            "Kernighan",
            "Programming",
            dec!(45.00),
            total,
        )
    }

    #[test]
    fn test_isbn_is_trimmed() {
        let isbn = Isbn::new("  978-1  ").unwrap();
        assert_eq!(isbn.as_str(), "978-1");
    }

    #[test]
    fn test_isbn_rejects_blank() {
        assert!(matches!(
            Isbn::new("   "),
            Err(LibraryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_isbn_deserialization_validates() {
        let ok: Isbn = serde_json::from_str("\"123\"").unwrap();
        assert_eq!(ok.as_str(), "123");
        assert!(serde_json::from_str::<Isbn>("\"\"").is_err());
    }

    #[test]
    fn test_stock_movement_delta() {
        assert_eq!(StockMovement::Checkout.delta(), -1);
        assert_eq!(StockMovement::Return.delta(), 1);
    }

    #[test]
    fn test_new_book_has_all_copies_available() {
        let book = sample_book(3);
        assert_eq!(book.available_copies, 3);
        assert_eq!(book.checked_out(), 0);
        assert!(book.has_stock());
        assert!(book.is_active);
    }

    #[test]
    fn test_book_without_copies_has_no_stock() {
        let book = sample_book(0);
        assert!(!book.has_stock());
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_available_above_total() {
        let mut book = sample_book(2);
        book.available_copies = 3;
        assert!(matches!(
            book.validate(),
            Err(LibraryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut book = sample_book(2);
        book.reference_price = dec!(-1.0);
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_total_must_cover_loans() {
        let mut book = sample_book(5);
        book.available_copies = 2;

        assert_eq!(book.checked_out(), 3);
        assert!(book.ensure_total_covers_loans(3).is_ok());
        assert!(book.ensure_total_covers_loans(10).is_ok());
        assert!(matches!(
            book.ensure_total_covers_loans(2),
            Err(LibraryError::ValidationError(_))
        ));
    }
}
