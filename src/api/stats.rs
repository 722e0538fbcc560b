//! Statistics endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppResult;

use super::AuthenticatedUser;

/// Library-wide counters for the admin dashboard
#[derive(Serialize, ToSchema)]
pub struct AdminStats {
    /// Number of distinct titles in the catalog
    pub total_book_titles: i64,
    /// Sum of total copies across all titles
    pub total_copies: i64,
    /// Copies currently out (active loans)
    pub total_borrowed: i64,
    /// Copies currently available
    pub total_available: i64,
    /// Registered users
    pub total_users: i64,
    /// Administrator accounts
    pub total_admins: i64,
}

/// Get admin statistics
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library statistics", body = AdminStats),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn get_admin_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AdminStats>> {
    claims.require_admin()?;

    let stats = state.services.stats.get_admin_stats().await?;
    Ok(Json(stats))
}
