//! Format listing, health and the docs endpoints.
//!
//! Run with: `cargo test -p convertease-api --test formats_test`

mod helpers;

use helpers::TestApp;
use serde_json::Value;

fn codes(body: &Value) -> Vec<String> {
    body["formats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["code"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_list_all_formats() {
    let app = TestApp::new().await;

    let response = app.get(None, "/formats").await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert!(body.get("source_type").is_none());

    let codes = codes(&body);
    for code in ["PDF", "DOCX", "TXT", "PNG", "JPG", "WEBP"] {
        assert!(codes.iter().any(|c| c == code), "missing {}", code);
    }
}

#[tokio::test]
async fn test_formats_for_source_type() {
    let app = TestApp::new().await;

    let body = app
        .get(None, "/formats?source_type=IMAGE/PNG")
        .await
        .json::<Value>();
    assert_eq!(body["source_type"], "image/png");
    assert!(body["formats"]
        .as_array()
        .unwrap()
        .iter()
        .all(|f| f["category"] == "image"));

    let body = app
        .get(None, "/formats?source_type=text/plain%3B%20charset%3Dutf-8")
        .await
        .json::<Value>();
    assert_eq!(body["source_type"], "text/plain");
    assert!(codes(&body).iter().any(|c| c == "PDF"));

    let body = app
        .get(None, "/formats?source_type=application/zip")
        .await
        .json::<Value>();
    assert!(codes(&body).is_empty());
}

#[tokio::test]
async fn test_search_formats_by_label_or_category() {
    let app = TestApp::new().await;

    let body = app.get(None, "/formats?q=WORD").await.json::<Value>();
    assert_eq!(body["q"], "WORD");
    assert_eq!(codes(&body), vec!["DOC", "DOCX", "WORD"]);
    assert_eq!(body["groups"][0]["category"], "document");
    assert_eq!(body["groups"].as_array().unwrap().len(), 1);

    let body = app.get(None, "/formats?q=image").await.json::<Value>();
    let found = codes(&body);
    assert!(found.contains(&"EPS".to_string()));
    assert!(!found.contains(&"PDF".to_string()));

    // Search narrows the compatible targets, it never widens them
    let body = app
        .get(None, "/formats?source_type=text/plain&q=image")
        .await
        .json::<Value>();
    assert!(codes(&body).is_empty());
    assert!(body["groups"].as_array().unwrap().is_empty());

    let body = app
        .get(None, "/formats?source_type=image/png&q=jpeg")
        .await
        .json::<Value>();
    assert_eq!(codes(&body), vec!["JPG"]);
}

#[tokio::test]
async fn test_health_and_security_headers() {
    let app = TestApp::new().await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "healthy");
    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert!(response.maybe_header("x-request-id").is_some());
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = TestApp::new().await;

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let spec = response.json::<Value>();
    assert!(spec["paths"].get("/api/v1/conversions").is_some());
}
