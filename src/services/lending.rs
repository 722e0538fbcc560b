//! Lending coordinator
//!
//! Orchestrates borrow/return as a single transaction spanning the loan
//! registry and the inventory ledger, so the two lending invariants hold
//! under concurrent requests:
//!
//! - a title is never lent out more times than it has copies, and
//! - a user never holds two concurrent loans on the same title.
//!
//! Serializability per book comes from the store: the availability check is
//! a conditional UPDATE (which also takes the book's row lock), and active
//! (user, book) uniqueness is a partial unique index. Either guard failing
//! rolls the whole transaction back, so no orphaned loan or stray counter
//! increment is ever visible.

use crate::{
    error::{AppError, AppResult},
    models::{book::Book, loan::Loan},
    repository::Repository,
};

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
}

impl LendingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow one copy of a book for a user.
    ///
    /// Fails with `NotFound` when the book does not exist, and with
    /// `Conflict` when the user already holds this title or no copy is
    /// available. The pre-checks give precise messages; the index and the
    /// conditional update enforce the same rules at write time, closing the
    /// race between check and write.
    pub async fn borrow(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        let book = self.repository.books.get_by_id(book_id).await?;

        if self.repository.loans.has_active_loan(user_id, book_id).await? {
            return Err(AppError::Conflict(
                "You have already borrowed this book".to_string(),
            ));
        }
        if book.available_copies() <= 0 {
            return Err(AppError::Conflict(
                "No copies of this book are available".to_string(),
            ));
        }

        let mut tx = self.repository.pool.begin().await?;

        let loan = self
            .repository
            .loans
            .open_loan(&mut *tx, user_id, book_id)
            .await?;
        self.repository
            .books
            .increment_borrowed(&mut *tx, book_id)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id, book_id, loan_id = loan.id, "book borrowed");
        Ok(loan)
    }

    /// Return a borrowed book.
    ///
    /// Fails with `NotFound` when the book does not exist or the user holds
    /// no active loan on it. If the ledger counter would underflow, the
    /// return still succeeds: the counter is clamped at zero and the
    /// inconsistency is logged loudly, since it means the cached count had
    /// already drifted from the registry.
    pub async fn return_book(&self, user_id: i32, book_id: i32) -> AppResult<Loan> {
        self.repository.books.get_by_id(book_id).await?;

        let mut tx = self.repository.pool.begin().await?;

        let loan = self
            .repository
            .loans
            .close_loan(&mut *tx, user_id, book_id)
            .await?;

        match self
            .repository
            .books
            .decrement_borrowed(&mut *tx, book_id)
            .await
        {
            Ok(()) => {}
            Err(AppError::InvariantViolation(msg)) => {
                tracing::error!(user_id, book_id, "{}; clamping at zero", msg);
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;

        tracing::info!(user_id, book_id, loan_id = loan.id, "book returned");
        Ok(loan)
    }

    /// Active loans of a user joined with their books
    pub async fn borrowed_books(
        &self,
        user_id: i32,
    ) -> AppResult<Vec<crate::models::loan::BorrowedBook>> {
        self.repository.loans.borrowed_books_for_user(user_id).await
    }

    /// Re-derive a book's cached `borrowed_count` from the authoritative
    /// active-loan count and overwrite it when the two have drifted apart.
    /// Returns the book with the reconciled counter.
    pub async fn reconcile(&self, book_id: i32) -> AppResult<Book> {
        let mut tx = self.repository.pool.begin().await?;

        let book = self.repository.books.get_for_update(&mut *tx, book_id).await?;
        let active = self
            .repository
            .loans
            .active_loan_count_for_book_tx(&mut *tx, book_id)
            .await?;

        // The counter cannot hold more than total_copies; active loans beyond
        // that are a broken invariant in their own right, reported but never
        // allowed to fail the repair.
        let actual = book.clamp_to_capacity(active);
        if i64::from(actual) != active {
            tracing::error!(
                book_id,
                active_loans = active,
                total_copies = book.total_copies,
                "active loans exceed total copies; clamping borrowed_count at capacity"
            );
        }

        if actual != book.borrowed_count {
            tracing::warn!(
                book_id,
                cached = book.borrowed_count,
                actual,
                "borrowed_count drifted from active loan count, reconciling"
            );
            self.repository
                .books
                .set_borrowed_count(&mut *tx, book_id, actual)
                .await?;
        }

        tx.commit().await?;
        self.repository.books.get_by_id(book_id).await
    }
}
