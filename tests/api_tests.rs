//! API integration tests
//!
//! These drive a running server with a fresh database.
//! Run with: cargo test -- --ignored

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Create an author and return its id
async fn create_author(client: &Client) -> i64 {
    let response = client
        .post(format!("{}/authors", BASE_URL))
        .json(&json!({
            "firstname": "Victor",
            "lastname": format!("Hugo-{}", std::process::id()),
            "birth": "1802-02-26",
            "country": "France"
        }))
        .send()
        .await
        .expect("Failed to create author");

    let body: Value = response.json().await.expect("Failed to parse author");
    body["id"].as_i64().expect("No id in author response")
}

/// Create a book with one copy and return its id
async fn create_book(client: &Client, author_id: i64, copies: i64) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "title": "Les Misérables",
            "isbn": format!("isbn-{}-{}", std::process::id(), author_id),
            "year": 1862,
            "author_id": author_id,
            "nb_owned": copies,
            "language": "fr",
            "pages": 1232
        }))
        .send()
        .await
        .expect("Failed to create book");

    let body: Value = response.json().await.expect("Failed to parse book");
    body["id"].as_i64().expect("No id in book response")
}

#[tokio::test]
#[ignore]
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
async fn test_author_crud() {
    let client = Client::new();
    let author_id = create_author(&client).await;

    let response = client
        .get(format!("{}/authors/{}", BASE_URL, author_id))
        .send()
        .await
        .expect("Failed to get author");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["author"]["firstname"], "Victor");
    assert!(body["books"].as_array().unwrap().is_empty());

    let response = client
        .patch(format!("{}/authors/{}", BASE_URL, author_id))
        .json(&json!({"country": "Belgique"}))
        .send()
        .await
        .expect("Failed to update author");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["country"], "Belgique");
}

#[tokio::test]
#[ignore]
async fn test_checkout_renew_return_flow() {
    let client = Client::new();
    let author_id = create_author(&client).await;
    let book_id = create_book(&client, author_id, 1).await;

    // Checkout the only copy
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({
            "book_id": book_id,
            "loaner_name": "Jean Valjean",
            "loaner_contact": format!("contact-{}", book_id),
            "loaner_card": book_id
        }))
        .send()
        .await
        .expect("Failed to checkout");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().unwrap();
    assert_eq!(loan["active"], true);

    // The shelf is now empty: a second checkout must conflict
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({
            "book_id": book_id,
            "loaner_name": "Cosette",
            "loaner_contact": "rue Plumet",
            "loaner_card": 9999999
        }))
        .send()
        .await
        .expect("Failed to send second checkout");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "out_of_stock");

    // Renew once
    let response = client
        .post(format!("{}/loans/{}/renew", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to renew");
    assert!(response.status().is_success());

    // A second renewal is rejected
    let response = client
        .post(format!("{}/loans/{}/renew", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send second renew");
    assert_eq!(response.status(), 409);

    // Return the book
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to return");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "returned");
    assert_eq!(body["late_days"], 0);
    assert_eq!(body["penalty"], 0);

    // Returning again is rejected
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send second return");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "already_returned");

    // The copy is back on the shelf
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to get book");
    let body: Value = response.json().await.expect("Failed to parse book");
    assert_eq!(body["book"]["nb_available"], 1);
}

#[tokio::test]
#[ignore]
async fn test_loan_views() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans?status=late", BASE_URL))
        .send()
        .await
        .expect("Failed to list late loans");
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/loans?status=nonsense", BASE_URL))
        .send()
        .await
        .expect("Failed to send bad status");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "invalid_status");
}
