//! Loan (borrow record) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::Book;

/// Loan model from database. `return_date = NULL` means the loan is active
/// (a copy is out); a non-null value closes it. Closed loans are kept as an
/// append-only audit history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Active loan joined with its book, for "my borrowed books" listings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowedBook {
    pub loan_id: i64,
    pub borrow_date: DateTime<Utc>,
    #[serde(flatten)]
    pub book: Book,
}
