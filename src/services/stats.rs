//! Statistics service

use crate::{api::stats::AdminStats, error::AppResult, repository::Repository};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Aggregate library-wide counters for the admin dashboard
    pub async fn get_admin_stats(&self) -> AppResult<AdminStats> {
        let pool = &self.repository.pool;

        let total_book_titles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(pool)
            .await?;

        let total_copies: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(total_copies), 0) FROM books")
                .fetch_one(pool)
                .await?;

        // Authoritative count from the loan registry, not the cached counters
        let total_borrowed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE return_date IS NULL")
                .fetch_one(pool)
                .await?;

        let total_available: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_copies - borrowed_count), 0) FROM books",
        )
        .fetch_one(pool)
        .await?;

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        let total_admins: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .fetch_one(pool)
                .await?;

        Ok(AdminStats {
            total_book_titles,
            total_copies,
            total_borrowed,
            total_available,
            total_users,
            total_admins,
        })
    }
}
