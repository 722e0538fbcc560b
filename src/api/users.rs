//! User endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, models::loan::BorrowedBook};

use super::AuthenticatedUser;

/// Get the books currently borrowed by the authenticated user
#[utoipa::path(
    get,
    path = "/users/me/borrowed-books",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans with book details", body = Vec<BorrowedBook>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_my_borrowed_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowedBook>>> {
    let books = state
        .services
        .lending
        .borrowed_books(claims.user_id)
        .await?;
    Ok(Json(books))
}
