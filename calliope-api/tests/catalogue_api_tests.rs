//! Integration tests for reference data: authors, publishers, genres, formats

mod helpers;

use axum::http::StatusCode;
use helpers::{dune, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_author_crud() {
    let app = TestApp::new().await;
    let admin = app.register("root").await;
    let user = app.register("reader").await;

    let (status, _) = app
        .send("POST", "/api/authors", None, Some(json!({"firstName": "Ursula", "lastName": "Le Guin"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            "POST",
            "/api/authors",
            Some(&user),
            Some(json!({"firstName": "Ursula", "lastName": "Le Guin", "birthDate": "1929-10-21"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["fullName"], "Ursula Le Guin");
    let uri = format!("/api/authors/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = app
        .send(
            "PUT",
            &uri,
            Some(&user),
            Some(json!({"firstName": "Ursula K.", "lastName": "Le Guin"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullName"], "Ursula K. Le Guin");

    let (status, _) = app.send("DELETE", &uri, Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_author_with_books_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.register("root").await;

    let (_, body) = app.send("POST", "/api/books", Some(&admin), Some(dune())).await;
    let author_id = body["data"]["author"]["id"].as_str().unwrap();

    let (status, body) = app
        .send("DELETE", &format!("/api/authors/{}", author_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(app.count("authors").await, 1);
}

#[tokio::test]
async fn test_publisher_crud() {
    let app = TestApp::new().await;
    let admin = app.register("root").await;

    let (status, body) = app
        .send("POST", "/api/publishers", Some(&admin), Some(json!({"name": "Ace Books", "country": "US"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Ace Books");

    let (status, _) = app
        .send("POST", "/api/publishers", Some(&admin), Some(json!({"name": "Ace Books"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listed) = app.send("GET", "/api/publishers", None, None).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_genre_tagging() {
    let app = TestApp::new().await;
    let admin = app.register("root").await;

    let (_, book) = app.send("POST", "/api/books", Some(&admin), Some(dune())).await;
    let book_id = book["data"]["id"].as_str().unwrap().to_string();
    let (status, genre) = app
        .send("POST", "/api/genres", Some(&admin), Some(json!({"name": "Science fiction"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let genre_id = genre["data"]["id"].as_str().unwrap().to_string();
    let tag_uri = format!("/api/books/{}/genres/{}", book_id, genre_id);

    let (status, body) = app.send("POST", &tag_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["genres"][0]["name"], "Science fiction");

    let (status, body) = app.send("DELETE", &tag_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["genres"].as_array().unwrap().is_empty());

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/books/{}/genres/6f9d1c52-6f0e-4d2e-9a43-9d3c8d7b1a00", book_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_formats_default_language() {
    let app = TestApp::new().await;
    let admin = app.register("root").await;

    let (status, body) = app
        .send("POST", "/api/formats", Some(&admin), Some(json!({"type": "audiobook"})))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["type"], "audiobook");
    assert_eq!(body["data"]["language"], "No language provided yet");

    let (_, listed) = app.send("GET", "/api/formats", None, None).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_format_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.register("root").await;

    let (_, body) = app.send("POST", "/api/books", Some(&admin), Some(dune())).await;
    let format_id = body["data"]["publishings"][0]["format"]["id"].as_str().unwrap();

    let (status, body) = app
        .send("DELETE", &format!("/api/formats/{}", format_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(app.count("formats").await, 1);
}
