use crate::domain::book::{Book, Isbn};
use crate::error::{LibraryError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a catalog import file.
#[derive(Debug, Clone, Deserialize)]
pub struct BookRecord {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub reference_price: Decimal,
    pub total_copies: i64,
}

impl TryFrom<BookRecord> for Book {
    type Error = LibraryError;

    fn try_from(record: BookRecord) -> Result<Self> {
        let book = Book::new(
            Isbn::new(record.isbn)?,
            record.title,
            record.author,
            record.category,
            record.reference_price,
            record.total_copies,
        );
        book.validate()?;
        Ok(book)
    }
}

/// Reads catalog entries from a CSV source.
///
/// Expects the header `isbn,title,author,category,reference_price,total_copies`.
/// Whitespace around fields is trimmed.
pub struct BookReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> BookReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates each row, so one bad row does not stop the
    /// rows after it.
    pub fn books(self) -> impl Iterator<Item = Result<Book>> {
        self.reader
            .into_deserialize::<BookRecord>()
            .map(|result| result.map_err(LibraryError::from).and_then(Book::try_from))
    }
}
