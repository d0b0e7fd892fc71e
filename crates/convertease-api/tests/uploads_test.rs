//! Upload intake over HTTP.
//!
//! Run with: `cargo test -p convertease-api --test uploads_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use convertease_core::models::{Tier, TierLimits};
use helpers::fixtures::{png_with_alpha, text_file};
use helpers::{api_path, config_with_limits, TestApp, ACME_KEY};
use serde_json::Value;

#[tokio::test]
async fn test_upload_text_file_lists_compatible_formats() {
    let app = TestApp::new().await;

    let response = app
        .upload(Some(ACME_KEY), "notes.txt", "text/plain", text_file(&["hello"]))
        .await;

    assert_eq!(response.status_code(), 201);
    let body = response.json::<Value>();
    assert_eq!(body["filename"], "notes.txt");
    assert_eq!(body["content_type"], "text/plain");
    assert_eq!(body["category"], "document");
    assert_eq!(body["size_bytes"], 6);

    let formats: Vec<&str> = body["compatible_formats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert!(formats.contains(&"PDF"));
    assert!(formats.contains(&"TXT"));
    assert!(!formats.contains(&"PNG"));
}

#[tokio::test]
async fn test_upload_image_is_image_category() {
    let app = TestApp::new().await;

    let response = app
        .upload(None, "logo.png", "image/png", png_with_alpha(8, 8))
        .await;

    assert_eq!(response.status_code(), 201);
    let body = response.json::<Value>();
    assert_eq!(body["category"], "image");
    assert!(body["compatible_formats"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "JPG"));
}

#[tokio::test]
async fn test_upload_rejects_two_files() {
    let app = TestApp::new().await;

    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(text_file(&["a"])).file_name("a.txt").mime_type("text/plain"),
        )
        .add_part(
            "file",
            Part::bytes(text_file(&["b"])).file_name("b.txt").mime_type("text/plain"),
        );
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "TOO_MANY_FILES");
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().add_text("note", "no file here");
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_upload_over_tier_limit() {
    let limits = TierLimits {
        max_upload_bytes: 1024,
        ..TierLimits::defaults_for(Tier::Free)
    };
    let app = TestApp::with_config(config_with_limits(Tier::Free, limits)).await;

    let response = app
        .upload(None, "big.txt", "text/plain", vec![b'x'; 4096])
        .await;

    assert_eq!(response.status_code(), 413);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "FILE_TOO_LARGE");
    assert_eq!(body["kind"], "validation");
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn test_rejected_file_ends_the_upload() {
    let limits = TierLimits {
        max_upload_bytes: 1024,
        ..TierLimits::defaults_for(Tier::Free)
    };
    let app = TestApp::with_config(config_with_limits(Tier::Free, limits)).await;

    // The oversize first file decides the answer; the second part is never read
    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(vec![b'x'; 4096]).file_name("big.txt").mime_type("text/plain"),
        )
        .add_part(
            "file",
            Part::bytes(text_file(&["b"])).file_name("b.txt").mime_type("text/plain"),
        );
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 413);
    assert_eq!(response.json::<Value>()["code"], "FILE_TOO_LARGE");
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn test_upload_unconvertible_type() {
    let app = TestApp::new().await;

    let response = app
        .upload(None, "archive.zip", "application/zip", vec![0x50, 0x4B, 0x03, 0x04])
        .await;

    assert_eq!(response.status_code(), 415);
    assert_eq!(response.json::<Value>()["code"], "UNSUPPORTED_TYPE");
}

#[tokio::test]
async fn test_upload_content_must_match_declared_type() {
    let app = TestApp::new().await;

    let response = app
        .upload(None, "fake.png", "image/png", text_file(&["not a png"]))
        .await;

    assert_eq!(response.status_code(), 415);
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn test_upload_rejects_bad_api_key() {
    let app = TestApp::new().await;

    let response = app
        .upload(Some("wrong-key"), "notes.txt", "text/plain", text_file(&["x"]))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");
}
