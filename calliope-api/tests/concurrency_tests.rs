//! Overlapping writers against a WAL database file

mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use calliope_api::services::book_ingestion::{create_book_entities, CreateBookInput, PageCount};
use helpers::{dune, TestApp};
use serde_json::json;

const WRITERS: usize = 16;

fn kindred_edition(n: usize) -> CreateBookInput {
    CreateBookInput {
        title: Some(format!("Kindred, printing {}", n)),
        author: "Octavia E. Butler".to_string(),
        editor: Some("Doubleday".to_string()),
        format: "paper".to_string(),
        language: Some("en".to_string()),
        isbn: None,
        nb_page: Some(PageCount::Number(264)),
        date: Some("1979-06-01".to_string()),
        summary: None,
        cover: None,
        genres: vec!["Speculative fiction".to_string()],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_ingestion_shares_one_author() {
    let app = TestApp::on_disk().await;

    let tasks: Vec<_> = (0..WRITERS)
        .map(|n| {
            let pool = app.pool.clone();
            let storage = app.storage.clone();
            tokio::spawn(async move {
                create_book_entities(&pool, &storage, 1024, kindred_edition(n)).await
            })
        })
        .collect();

    for task in tasks {
        let outcome = task.await.unwrap();
        assert!(outcome.is_ok(), "ingestion failed: {:?}", outcome.err());
    }

    assert_eq!(app.count("authors").await, 1);
    assert_eq!(app.count("formats").await, 1);
    assert_eq!(app.count("genres").await, 1);
    assert_eq!(app.count("books").await, WRITERS as i64);
    assert_eq!(app.count("publishings").await, WRITERS as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_registration_has_one_admin() {
    let app = Arc::new(TestApp::on_disk().await);

    let tasks: Vec<_> = (0..WRITERS)
        .map(|n| {
            let app = Arc::clone(&app);
            tokio::spawn(async move { app.register(&format!("reader{}", n)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(app.count("users").await, WRITERS as i64);
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(admins, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_comments_all_land() {
    let app = Arc::new(TestApp::on_disk().await);
    let token = app.register("librarian").await;
    let (status, book) = app.send("POST", "/api/books", Some(&token), Some(dune())).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/books/{}/comments", book["data"]["id"].as_str().unwrap());

    let tasks: Vec<_> = (0..WRITERS)
        .map(|_| {
            let app = Arc::clone(&app);
            let token = token.clone();
            let uri = uri.clone();
            tokio::spawn(async move {
                app.send("POST", &uri, Some(&token), Some(json!({"content": "Again.", "rating": 4})))
                    .await
                    .0
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::CREATED);
    }

    assert_eq!(app.count("comments").await, WRITERS as i64);
    let rating: f64 = sqlx::query_scalar("SELECT rating FROM books")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(rating, 4.0);
}
