//! Loans repository: the active-loan registry
//!
//! Maintains the set of loans, at most one active loan per (user, book) pair.
//! Uniqueness is enforced by the store itself (a partial unique index on
//! active loans), so the pre-check in the coordinator can never race the
//! insert.

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::loan::{BorrowedBook, Loan},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Whether the user currently holds an active loan on the book
    pub async fn has_active_loan(&self, user_id: i32, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL)",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Open a new loan for the pair. A duplicate-key rejection from the
    /// active-loan unique index means another request won the race; it is
    /// reported as the same `Conflict` as the coordinator's pre-check.
    /// Transaction-scoped.
    pub async fn open_loan(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Loan> {
        let result = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, borrow_date)
            VALUES ($1, $2, NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(conn)
        .await;

        match result {
            Ok(loan) => Ok(loan),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(
                "You have already borrowed this book".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Close the active loan for the pair by stamping its return date.
    /// Transaction-scoped.
    pub async fn close_loan(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET return_date = NOW()
            WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "You haven't borrowed this book or it was already returned".to_string(),
            )
        })
    }

    /// Snapshot of the user's active loans
    pub async fn active_loans_for_user(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE user_id = $1 AND return_date IS NULL ORDER BY borrow_date",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Active loans of a user joined with their books
    pub async fn borrowed_books_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowedBook>> {
        let rows = sqlx::query_as::<_, BorrowedBookRow>(
            r#"
            SELECT l.id AS loan_id, l.borrow_date,
                   b.id, b.title, b.author, b.genre, b.cover_image_url,
                   b.total_copies, b.borrowed_count, b.created_at, b.updated_at
            FROM loans l
            JOIN books b ON l.book_id = b.id
            WHERE l.user_id = $1 AND l.return_date IS NULL
            ORDER BY l.borrow_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BorrowedBook::from).collect())
    }

    /// Authoritative count of active loans on a book; used to validate and
    /// reconcile the ledger's cached `borrowed_count`.
    pub async fn active_loan_count_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Same count, inside an open transaction
    pub async fn active_loan_count_for_book_tx(
        &self,
        conn: &mut PgConnection,
        book_id: i32,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(book_id)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct BorrowedBookRow {
    loan_id: i64,
    borrow_date: chrono::DateTime<chrono::Utc>,
    id: i32,
    title: String,
    author: String,
    genre: String,
    cover_image_url: Option<String>,
    total_copies: i32,
    borrowed_count: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<BorrowedBookRow> for BorrowedBook {
    fn from(row: BorrowedBookRow) -> Self {
        BorrowedBook {
            loan_id: row.loan_id,
            borrow_date: row.borrow_date,
            book: crate::models::book::Book {
                id: row.id,
                title: row.title,
                author: row.author,
                genre: row.genre,
                cover_image_url: row.cover_image_url,
                total_copies: row.total_copies,
                borrowed_count: row.borrowed_count,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}
