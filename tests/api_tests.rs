//! API integration tests
//!
//! These run against a live server on localhost:8080 backed by a database
//! where the first registered account is `admin@librum.dev` / `admin123`.

use reqwest::Client;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos()
}

/// Helper to get the admin token
async fn get_admin_token(client: &Client) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@librum.dev",
            "password": "admin123"
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Helper to register a fresh user and return their token
async fn register_user(client: &Client) -> String {
    let suffix = unique_suffix();
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "username": format!("reader{}", suffix),
            "email": format!("reader{}@example.com", suffix),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse register response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Helper to create a book as admin, returning its id
async fn create_book(client: &Client, admin_token: &str, total_copies: i32) -> i64 {
    let suffix = unique_suffix();
    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({
            "title": format!("Test Book {}", suffix),
            "author": "Test Author",
            "genre": "Testing",
            "total_copies": total_copies
        }))
        .send()
        .await
        .expect("Failed to send create book request");

    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse book response");
    body["id"].as_i64().expect("No id in response")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_register_and_login() {
    let client = Client::new();
    let suffix = unique_suffix();
    let email = format!("reader{}@example.com", suffix);

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "username": format!("reader{}", suffix),
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "user");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@librum.dev",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_get_current_user() {
    let client = Client::new();
    let token = get_admin_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "admin@librum.dev");
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
#[ignore]
async fn test_list_books_is_public() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());
}

#[tokio::test]
#[ignore]
async fn test_create_book_requires_admin() {
    let client = Client::new();
    let token = register_user(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": "Unauthorized",
            "author": "Nobody",
            "genre": "None",
            "total_copies": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_round_trip() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let user_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 2).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send borrow request");

    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse borrow response");
    assert!(body["loan"]["id"].is_number());
    assert!(body["loan"]["return_date"].is_null());

    // The copy shows up in the user's borrowed books
    let response = client
        .get(format!("{}/users/me/borrowed-books", BASE_URL))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send request");

    let body: Value = response.json().await.expect("Failed to parse response");
    let borrowed = body.as_array().expect("Expected an array");
    assert!(borrowed.iter().any(|b| b["id"].as_i64() == Some(book_id)));

    // The ledger counts the loan
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["borrowed_count"], 1);

    // Return it
    let response = client
        .post(format!("{}/books/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send return request");

    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse return response");
    assert!(body["loan"]["return_date"].is_string());

    // Copy back on the shelf
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["borrowed_count"], 0);

    // The pair is back to NONE, borrowing again succeeds
    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 201);
}

#[tokio::test]
#[ignore]
async fn test_double_borrow_is_rejected() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let user_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 5).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_borrow_exhausted_copies_is_rejected() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let first_token = register_user(&client).await;
    let second_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 1).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", first_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", second_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 409);

    // After the first user returns, the second can borrow
    let response = client
        .post(format!("{}/books/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", first_token))
        .send()
        .await
        .expect("Failed to send return request");
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", second_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 201);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrow_of_last_copy() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let first_token = register_user(&client).await;
    let second_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 1).await;

    let first = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", first_token))
        .send();
    let second = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", second_token))
        .send();

    let (first, second) = tokio::join!(first, second);
    let first = first.expect("Failed to send borrow request").status();
    let second = second.expect("Failed to send borrow request").status();

    // Exactly one wins, regardless of ordering
    let statuses = [first.as_u16(), second.as_u16()];
    assert!(statuses.contains(&201), "no borrow succeeded: {:?}", statuses);
    assert!(statuses.contains(&409), "both borrows succeeded: {:?}", statuses);

    // The ledger never oversells
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["borrowed_count"], 1);
}

#[tokio::test]
#[ignore]
async fn test_return_without_loan() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let user_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 1).await;

    let response = client
        .post(format!("{}/books/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send return request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_delete_book_with_active_loan() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let user_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 1).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 201);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), 409);

    // Deletable once returned
    let response = client
        .post(format!("{}/books/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send return request");
    assert_eq!(response.status(), 200);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore]
async fn test_shrink_copies_below_active_loans() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let user_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 2).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 201);

    // Shrinking to 1 is fine, one copy is out
    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({ "total_copies": 1 }))
        .send()
        .await
        .expect("Failed to send update request");
    assert_eq!(response.status(), 200);

    // Shrinking below the active loan count is not, and a metadata change
    // bundled with the rejected shrink must roll back with it
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    let before: Value = response.json().await.expect("Failed to parse response");

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({ "title": "Should Not Stick", "total_copies": 0 }))
        .send()
        .await
        .expect("Failed to send update request");
    assert_eq!(response.status(), 409);

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    let after: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(after["title"], before["title"]);
    assert_eq!(after["total_copies"], before["total_copies"]);
}

#[tokio::test]
#[ignore]
async fn test_reconcile_is_a_noop_on_consistent_book() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;
    let user_token = register_user(&client).await;
    let book_id = create_book(&client, &admin_token, 3).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", user_token))
        .send()
        .await
        .expect("Failed to send borrow request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/books/{}/reconcile", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .expect("Failed to send reconcile request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["borrowed_count"], 1);
}

#[tokio::test]
#[ignore]
async fn test_admin_stats() {
    let client = Client::new();
    let admin_token = get_admin_token(&client).await;

    let response = client
        .get(format!("{}/admin/stats", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["total_book_titles"].is_number());
    assert!(body["total_copies"].is_number());
    assert!(body["total_borrowed"].is_number());
    assert!(body["total_available"].is_number());
    assert!(body["total_users"].is_number());
    assert!(body["total_admins"].is_number());
}

#[tokio::test]
#[ignore]
async fn test_admin_stats_requires_admin() {
    let client = Client::new();
    let token = register_user(&client).await;

    let response = client
        .get(format!("{}/admin/stats", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}
