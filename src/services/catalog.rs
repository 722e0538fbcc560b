//! Book catalog service

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List books matching the query
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.list(query).await
    }

    /// Get a single book
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Add a new book to the catalog
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        self.repository.books.create(&book).await
    }

    /// Update a book. Metadata changes are unconditional; a `total_copies`
    /// change goes through the ledger guard and fails with `Conflict` when
    /// it would fall below the number of copies currently out. Both run in
    /// one transaction: a rejected copies change rolls the metadata change
    /// back with it.
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        let mut tx = self.repository.pool.begin().await?;

        let mut book = self
            .repository
            .books
            .update_metadata(&mut *tx, id, &update)
            .await?;
        if let Some(new_total) = update.total_copies {
            book = self
                .repository
                .books
                .adjust_total_copies(&mut *tx, id, new_total)
                .await?;
        }

        tx.commit().await?;
        Ok(book)
    }

    /// Delete a book. Rejected while any copy is borrowed; closed loan
    /// history is cascaded away with the book.
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await
    }
}
