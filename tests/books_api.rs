mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use perpus_api_types::{BookResponse, BookStatus, ErrorBody, LiveEvent};
use uuid::Uuid;

use support::{
    BASE_URL, FilePart, SAMPLE_PDF, TestApp, body_bytes, body_json, complete_book_fields,
    multipart_request, pdf_part,
};

fn stored_name(link: &str) -> &str {
    link.strip_prefix(&format!("{BASE_URL}/uploads/"))
        .expect("upload link under base url")
}

async fn create_sample_book(app: &TestApp) -> BookResponse {
    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/books",
            &complete_book_fields(),
            &[pdf_part(SAMPLE_PDF)],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn create_book_stores_pdf_and_announces_it() {
    let app = TestApp::new();
    let (_handle, mut receiver) = app.state.broadcaster.connect().expect("subscribe");
    let ack = receiver.recv().await.expect("ack frame");
    assert!(ack.contains("\"type\":\"connection\""));

    let book = create_sample_book(&app).await;

    assert_eq!(book.title, "Bumi Manusia");
    assert_eq!(book.status, BookStatus::Available);
    assert_eq!(book.language.as_deref(), Some("Unknown"));
    assert!(book.cover_path.is_none());

    let pdf_link = book.pdf_path.clone().expect("pdf link");
    let name = stored_name(&pdf_link);
    assert!(name.ends_with("-bumi-manusia.pdf"), "unexpected name {name}");
    let on_disk = std::fs::read(app.state.upload_storage.root().join(name)).expect("stored pdf");
    assert_eq!(on_disk, SAMPLE_PDF);

    let frame = receiver.recv().await.expect("added frame");
    let event: LiveEvent = serde_json::from_str(&frame).expect("event json");
    assert_eq!(event, LiveEvent::BookAdded { payload: book.clone() });

    let download = app.get(&format!("/uploads/{name}")).await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(
        download
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    assert_eq!(body_bytes(download).await, SAMPLE_PDF);
}

#[tokio::test]
async fn create_book_without_pdf_is_rejected_and_leaves_no_files() {
    let app = TestApp::new();
    let (_handle, mut receiver) = app.state.broadcaster.connect().expect("subscribe");
    receiver.recv().await.expect("ack frame");

    let cover = FilePart {
        field: "coverImage",
        file_name: "cover.png",
        content_type: "image/png",
        data: b"\x89PNG\r\n\x1a\nfake",
    };
    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/books",
            &complete_book_fields(),
            &[cover],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(response).await;
    assert_eq!(
        body.error,
        "Title, author, description, genre, and a PDF file are required."
    );

    let leftovers = std::fs::read_dir(app.state.upload_storage.root())
        .expect("upload dir")
        .count();
    assert_eq!(leftovers, 0);
    assert!(app.catalog.books.lock().await.is_empty());
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn create_book_with_unknown_status_is_rejected() {
    let app = TestApp::new();
    let mut fields = complete_book_fields();
    fields.push(("status", "HILANG"));

    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/books",
            &fields,
            &[pdf_part(SAMPLE_PDF)],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(response).await;
    assert_eq!(body.error, "Invalid status provided.");
}

#[tokio::test]
async fn pdf_field_rejects_other_file_types() {
    let app = TestApp::new();
    let not_pdf = FilePart {
        field: "pdf",
        file_name: "notes.txt",
        content_type: "text/plain",
        data: b"plain text",
    };

    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/books",
            &complete_book_fields(),
            &[not_pdf],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(response).await;
    assert_eq!(body.error, "The pdf field only accepts PDF files.");
}

#[tokio::test]
async fn repeated_listing_is_served_from_cache_until_a_write() {
    let app = TestApp::new();
    app.catalog
        .seed_book("Laskar Pelangi", "Fiksi", BookStatus::Available)
        .await;

    let first = app.get("/api/books?sort=title&order=asc").await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_bytes(first).await;
    let second = body_bytes(app.get("/api/books?sort=title&order=asc").await).await;

    assert_eq!(first, second);
    assert_eq!(app.catalog.list_calls(), 1);

    create_sample_book(&app).await;

    let refreshed: Vec<BookResponse> =
        body_json(app.get("/api/books?sort=title&order=asc").await).await;
    assert_eq!(app.catalog.list_calls(), 2);
    assert_eq!(refreshed.len(), 2);
}

#[tokio::test]
async fn listing_rejects_unknown_sort_column() {
    let app = TestApp::new();

    let response = app.get("/api/books?sort=password").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.catalog.list_calls(), 0);
}

#[tokio::test]
async fn listing_filters_by_genre_and_status() {
    let app = TestApp::new();
    app.catalog
        .seed_book("Laskar Pelangi", "Fiksi", BookStatus::Available)
        .await;
    app.catalog
        .seed_book("Sapiens", "Sejarah", BookStatus::Available)
        .await;
    app.catalog
        .seed_book("Ronggeng Dukuh Paruk", "Fiksi", BookStatus::Borrowed)
        .await;

    let books: Vec<BookResponse> =
        body_json(app.get("/api/books?genre=Fiksi&status=DIPINJAM").await).await;

    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Ronggeng Dukuh Paruk");
}

#[tokio::test]
async fn zero_limit_returns_an_empty_list() {
    let app = TestApp::new();
    app.catalog
        .seed_book("Laskar Pelangi", "Fiksi", BookStatus::Available)
        .await;

    let response = app.get("/api/books?limit=0").await;

    assert_eq!(response.status(), StatusCode::OK);
    let books: Vec<BookResponse> = body_json(response).await;
    assert!(books.is_empty());
}

#[tokio::test]
async fn update_changes_fields_and_replaces_the_pdf() {
    let app = TestApp::new();
    let book = create_sample_book(&app).await;
    let old_name = stored_name(book.pdf_path.as_deref().expect("pdf")).to_string();

    let (_handle, mut receiver) = app.state.broadcaster.connect().expect("subscribe");
    receiver.recv().await.expect("ack frame");

    let replacement = FilePart {
        field: "pdf",
        file_name: "edisi-revisi.pdf",
        content_type: "application/pdf",
        data: b"%PDF-1.7 revised",
    };
    let response = app
        .send(multipart_request(
            Method::PUT,
            &format!("/api/books/{}", book.id),
            &[("status", "DIPINJAM"), ("title", "Bumi Manusia (Revisi)")],
            &[replacement],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let updated: BookResponse = body_json(response).await;
    assert_eq!(updated.id, book.id);
    assert_eq!(updated.status, BookStatus::Borrowed);
    assert_eq!(updated.title, "Bumi Manusia (Revisi)");
    assert_eq!(updated.author, book.author);

    let new_name = stored_name(updated.pdf_path.as_deref().expect("pdf")).to_string();
    assert_ne!(new_name, old_name);
    let root = app.state.upload_storage.root();
    assert!(root.join(&new_name).exists());
    assert!(!root.join(&old_name).exists());

    let frame = receiver.recv().await.expect("updated frame");
    let event: LiveEvent = serde_json::from_str(&frame).expect("event json");
    assert_eq!(event.kind(), "BOOK_UPDATED");
}

#[tokio::test]
async fn update_of_unknown_book_is_not_found() {
    let app = TestApp::new();

    let response = app
        .send(multipart_request(
            Method::PUT,
            &format!("/api/books/{}", Uuid::new_v4()),
            &[("title", "Ghost")],
            &[],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = body_json(response).await;
    assert_eq!(body.error, "Book not found");
}

#[tokio::test]
async fn delete_removes_book_files_and_broadcasts_id() {
    let app = TestApp::new();
    let book = create_sample_book(&app).await;
    let name = stored_name(book.pdf_path.as_deref().expect("pdf")).to_string();

    let (_handle, mut receiver) = app.state.broadcaster.connect().expect("subscribe");
    receiver.recv().await.expect("ack frame");

    let response = app
        .send(
            Request::delete(format!("/api/books/{}", book.id))
                .body(Body::empty())
                .expect("request"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!app.state.upload_storage.root().join(&name).exists());
    assert!(app.catalog.books.lock().await.is_empty());

    let frame = receiver.recv().await.expect("deleted frame");
    assert_eq!(
        frame.as_ref(),
        format!(
            "{{\"type\":\"BOOK_DELETED\",\"payload\":{{\"id\":\"{}\"}}}}",
            book.id
        )
    );
}

#[tokio::test]
async fn delete_of_missing_or_malformed_id_is_not_found_without_events() {
    let app = TestApp::new();
    let (_handle, mut receiver) = app.state.broadcaster.connect().expect("subscribe");
    receiver.recv().await.expect("ack frame");

    for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let response = app
            .send(
                Request::delete(format!("/api/books/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = body_json(response).await;
        assert_eq!(body.error, "Book not found");
    }

    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn facets_list_distinct_genres_and_languages() {
    let app = TestApp::new();
    app.catalog
        .seed_book("Laskar Pelangi", "Fiksi", BookStatus::Available)
        .await;
    app.catalog
        .seed_book("Sapiens", "Sejarah", BookStatus::Available)
        .await;
    app.catalog
        .seed_book("Negeri 5 Menara", "Fiksi", BookStatus::Borrowed)
        .await;

    let genres: Vec<String> = body_json(app.get("/api/genres").await).await;
    assert_eq!(genres, vec!["Fiksi".to_string(), "Sejarah".to_string()]);

    let languages: Vec<String> = body_json(app.get("/api/languages").await).await;
    assert_eq!(languages, vec!["Indonesia".to_string()]);
}
