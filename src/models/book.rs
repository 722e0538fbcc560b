//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database.
///
/// `borrowed_count` is a cached projection of the number of active loans on
/// this book; it is mutated only through the lending coordinator or by the
/// reconcile operation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub cover_image_url: Option<String>,
    pub total_copies: i32,
    pub borrowed_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Copies eligible to be borrowed. Non-negative by construction: the
    /// store enforces `0 <= borrowed_count <= total_copies`.
    pub fn available_copies(&self) -> i32 {
        self.total_copies - self.borrowed_count
    }

    /// A book can only be deleted while no copy is out.
    pub fn can_delete(&self) -> bool {
        self.borrowed_count == 0
    }

    /// Bound a registry-derived active-loan count to what this book's
    /// counter can hold (`0..=total_copies`), so writing it back can never
    /// trip the storage constraints.
    pub fn clamp_to_capacity(&self, active_loans: i64) -> i32 {
        active_loans.clamp(0, self.total_copies as i64) as i32
    }
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive search over title and author
    pub search: Option<String>,
    /// Exact genre filter
    pub genre: Option<String>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "Genre is required"))]
    pub genre: String,
    #[validate(range(min = 0, message = "Total copies cannot be negative"))]
    pub total_copies: i32,
    pub cover_image_url: Option<String>,
}

/// Update book request. `total_copies` goes through the inventory ledger
/// guard: it is rejected when the new value falls below the borrowed count.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    #[validate(range(min = 0, message = "Total copies cannot be negative"))]
    pub total_copies: Option<i32>,
    pub cover_image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn book(total: i32, borrowed: i32) -> Book {
        Book {
            id: 1,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            genre: "sf".to_string(),
            cover_image_url: None,
            total_copies: total,
            borrowed_count: borrowed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn available_copies_is_total_minus_borrowed() {
        assert_eq!(book(3, 1).available_copies(), 2);
        assert_eq!(book(1, 1).available_copies(), 0);
    }

    #[test]
    fn deletable_only_with_no_active_loans() {
        assert!(book(3, 0).can_delete());
        assert!(!book(3, 1).can_delete());
    }

    #[test]
    fn loan_counts_beyond_capacity_are_clamped() {
        let b = book(3, 0);
        assert_eq!(b.clamp_to_capacity(2), 2);
        assert_eq!(b.clamp_to_capacity(5), 3);
        assert_eq!(b.clamp_to_capacity(-1), 0);
    }

    #[test]
    fn create_book_rejects_negative_copies() {
        let req = CreateBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            genre: "sf".to_string(),
            total_copies: -1,
            cover_image_url: None,
        };
        assert!(req.validate().is_err());
    }
}
