//! Books repository: the inventory ledger
//!
//! Owns each book's `total_copies` / `borrowed_count` pair. The counters are
//! only ever mutated through conditional updates so that the availability
//! check and the write are a single atomic statement, never check-then-write.

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// List books, optionally filtered by search term (title/author) and genre
    pub async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let search = query
            .search
            .as_ref()
            .map(|s| format!("%{}%", s.trim()));

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
              AND ($2::text IS NULL OR genre = $2)
            ORDER BY title, id
            "#,
        )
        .bind(search)
        .bind(query.genre.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Create a new book with zero borrowed copies
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, genre, total_copies, cover_image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(book.total_copies)
        .bind(&book.cover_image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update book metadata. Transaction-scoped so a caller can combine it
    /// with [`adjust_total_copies`](Self::adjust_total_copies) and roll both
    /// back together.
    pub async fn update_metadata(
        &self,
        conn: &mut PgConnection,
        id: i32,
        update: &UpdateBook,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = COALESCE($2, title),
                author = COALESCE($3, author),
                genre = COALESCE($4, genre),
                cover_image_url = COALESCE($5, cover_image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.author.as_deref())
        .bind(update.genre.as_deref())
        .bind(update.cover_image_url.as_deref())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Set a book's total copy count. Rejected when the new value would fall
    /// below the number of copies currently out; the guard is part of the
    /// UPDATE itself so a concurrent borrow cannot slip between check and
    /// write. Transaction-scoped.
    pub async fn adjust_total_copies(
        &self,
        conn: &mut PgConnection,
        id: i32,
        new_total: i32,
    ) -> AppResult<Book> {
        if new_total < 0 {
            return Err(AppError::Validation(
                "Total copies cannot be negative".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET total_copies = $2, updated_at = NOW()
            WHERE id = $1 AND borrowed_count <= $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_total)
        .fetch_optional(&mut *conn)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None => {
                let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Book with id {} not found", id))
                    })?;
                Err(AppError::Conflict(format!(
                    "Cannot set total copies ({}) below currently borrowed copies ({})",
                    new_total, book.borrowed_count
                )))
            }
        }
    }

    /// Delete a book and cascade its closed loan history. Fails with
    /// `Conflict` while any copy is out; the row is locked so a concurrent
    /// borrow cannot race the check.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let borrowed_count: Option<i32> =
            sqlx::query_scalar("SELECT borrowed_count FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        match borrowed_count {
            None => return Err(AppError::NotFound(format!("Book with id {} not found", id))),
            Some(n) if n > 0 => {
                return Err(AppError::Conflict(
                    "Cannot delete book: copies are currently borrowed".to_string(),
                ))
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM loans WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Fetch a book and lock its row for the rest of the transaction
    pub async fn get_for_update(&self, conn: &mut PgConnection, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Atomically take one copy: increments `borrowed_count` only while a
    /// copy is available. Zero rows affected means no copy was free.
    /// Transaction-scoped; composed with loan creation by the coordinator.
    pub async fn increment_borrowed(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET borrowed_count = borrowed_count + 1, updated_at = NOW()
            WHERE id = $1 AND borrowed_count < total_copies
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "No copies of this book are available".to_string(),
            ));
        }
        Ok(())
    }

    /// Atomically give one copy back. Guarded at zero: if the counter is
    /// already 0 the registry invariant was broken upstream, and the caller
    /// decides how to flag it.
    pub async fn decrement_borrowed(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET borrowed_count = borrowed_count - 1, updated_at = NOW()
            WHERE id = $1 AND borrowed_count > 0
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvariantViolation(format!(
                "borrowed_count for book {} is already zero",
                id
            )));
        }
        Ok(())
    }

    /// Overwrite the cached `borrowed_count` with an authoritative value
    /// derived from the loan registry. Used by reconciliation.
    pub async fn set_borrowed_count(
        &self,
        conn: &mut PgConnection,
        id: i32,
        count: i32,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET borrowed_count = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(count)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
