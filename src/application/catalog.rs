use crate::domain::book::{Book, Isbn};
use crate::domain::ports::LibraryStoreRef;
use crate::error::{LibraryError, Result};
use tracing::{info, instrument};

/// Maintains the book catalog.
pub struct BookService {
    store: LibraryStoreRef,
}

impl BookService {
    pub fn new(store: LibraryStoreRef) -> Self {
        Self { store }
    }

    /// Adds a book to the catalog. The ISBN must not be registered yet.
    #[instrument(skip(self, book), fields(isbn = %book.isbn), err)]
    pub async fn register(&self, book: &Book) -> Result<()> {
        book.validate()?;
        if self.store.find_book(&book.isbn).await?.is_some() {
            return Err(LibraryError::DuplicateIsbn(book.isbn.clone()));
        }
        // A concurrent insert of the same ISBN still surfaces as DuplicateIsbn.
        self.store.insert_book(book).await?;
        info!(copies = book.total_copies, "book registered");
        Ok(())
    }

    /// Updates a book's descriptive fields and its total copy count.
    ///
    /// `book.available_copies` is ignored: the stored count is re-derived from
    /// the copies currently out on loan, so an update never races a loan or a
    /// return into an inconsistent state.
    #[instrument(skip(self, book), fields(isbn = %book.isbn), err)]
    pub async fn update(&self, book: &Book) -> Result<Book> {
        let current = self
            .store
            .find_book(&book.isbn)
            .await?
            .ok_or_else(|| LibraryError::BookNotFound(book.isbn.clone()))?;
        current.ensure_total_covers_loans(book.total_copies)?;

        let candidate = Book {
            available_copies: book.total_copies - current.checked_out(),
            ..book.clone()
        };
        candidate.validate()?;

        if !self.store.update_book(&candidate).await? {
            return Err(LibraryError::Consistency(format!(
                "copies of ISBN '{}' changed while updating its total",
                book.isbn
            )));
        }

        self.store
            .find_book(&book.isbn)
            .await?
            .ok_or_else(|| LibraryError::BookNotFound(book.isbn.clone()))
    }

    pub async fn find(&self, isbn: &Isbn) -> Result<Option<Book>> {
        self.store.find_book(isbn).await
    }

    pub async fn list(&self) -> Result<Vec<Book>> {
        self.store.list_books().await
    }

    /// Active books in `category`.
    pub async fn filter_by_category(&self, category: &str) -> Result<Vec<Book>> {
        self.store.books_by_category(category.trim()).await
    }

    /// Active books by `author`.
    pub async fn filter_by_author(&self, author: &str) -> Result<Vec<Book>> {
        self.store.books_by_author(author.trim()).await
    }

    #[instrument(skip_all, fields(%isbn, is_active), err)]
    pub async fn set_active(&self, isbn: &Isbn, is_active: bool) -> Result<()> {
        if !self.store.set_book_active(isbn, is_active).await? {
            return Err(LibraryError::BookNotFound(isbn.clone()));
        }
        info!("book activity changed");
        Ok(())
    }
}
