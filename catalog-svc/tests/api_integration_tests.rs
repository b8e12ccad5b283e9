//! Integration tests for catalog-svc API endpoints

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::util::ServiceExt;

use catalog_svc::queue::{default_dispatcher, spawn_consumers};
use catalog_svc::AppState;

/// Test helper: app over an in-memory database, with queue consumers running
async fn create_test_app() -> Router {
    let pool = catalog_svc::db::connect_in_memory()
        .await
        .expect("Failed to create in-memory database");
    let (state, receivers) = AppState::with_defaults(pool);
    spawn_consumers(state.clone(), default_dispatcher(), receivers);
    catalog_svc::build_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn upload(app: &Router, kind: &str, file_name: &str, contents: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/uploads/{}?file_name={}", kind, file_name))
        .body(Body::from(contents.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Poll a job until it reaches a terminal phase
async fn wait_for_job(app: &Router, job_id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, Method::GET, &format!("/uploads/{}", job_id), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["phase"] == "COMPLETED" || body["phase"] == "FAILED" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("upload job {} did not finish", job_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "catalog-svc");
}

#[tokio::test]
async fn test_category_crud() {
    let app = create_test_app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/categories",
        Some(json!({"Name": "Phones", "Description": "Mobile phones", "Specifications": ["Color", "Size"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["specifications"], json!(["Color", "Size"]));

    let (status, fetched) = send(&app, Method::GET, &format!("/categories/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Phones");

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/categories/{}", id),
        Some(json!({"name": "Smartphones", "specifications": ["Color"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Smartphones");

    let (status, _) = send(&app, Method::DELETE, &format!("/categories/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, &format!("/categories/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, deleted) = send(
        &app,
        Method::GET,
        &format!("/categories/{}?include_deleted=true", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!deleted["date_deleted"].is_null());
}

#[tokio::test]
async fn test_validation_error_payload() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/categories",
        Some(json!({"Name": "A", "Description": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["fields"]["Name"][0],
        "Name must be between 2 and 50 characters."
    );
    assert_eq!(
        body["error"]["fields"]["Description"][0],
        "Description must be between 4 and 1000 characters."
    );
}

#[tokio::test]
async fn test_default_category_delete_rejected() {
    let app = create_test_app().await;

    let (status, body) = send(&app, Method::DELETE, "/categories/1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_product_display_model_and_fallback() {
    let app = create_test_app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/products",
        Some(json!({"Name": "Widget", "CategoryId": 999, "SpecificationData": {"Color": "Red"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["category_id"], 1);
    assert_eq!(created["category_name"], "Uncategorized");
    assert_eq!(created["specification_data"], json!({}));

    let (status, list) = send(&app, Method::GET, "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, "/products/12345", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_products_listing() {
    let app = create_test_app().await;

    let (_, category) = send(
        &app,
        Method::POST,
        "/categories",
        Some(json!({"Name": "Shirts", "Specifications": ["Size"]})),
    )
    .await;
    let id = category["id"].as_i64().unwrap();

    send(
        &app,
        Method::POST,
        "/products",
        Some(json!({"Name": "Tee", "CategoryId": id, "SpecificationData": {"Size": "M"}})),
    )
    .await;

    let (status, products) =
        send(&app, Method::GET, &format!("/categories/{}/products", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(products[0]["specification_data"], json!({"Size": "M"}));

    let (status, _) = send(&app, Method::GET, "/categories/999/products", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_csv_end_to_end() {
    let app = create_test_app().await;

    let (status, accepted) = upload(
        &app,
        "categories",
        "cats.csv",
        "Name,Description\nA1,d1xx\nB1,d2xx\n",
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["status"], "Uploaded the file");
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let finished = wait_for_job(&app, &job_id).await;
    assert_eq!(
        finished["status"],
        "Upload completed: 2/2 categories were added successfully."
    );
    assert_eq!(finished["failed"], false);

    let (_, categories) = send(&app, Method::GET, "/categories", None).await;
    assert_eq!(categories.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = create_test_app().await;

    let (status, body) = upload(&app, "products", "empty.csv", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Uploaded file is empty");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/uploads/products")
        .body(Body::from("Name\nA\n"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_unsupported_format_fails_job() {
    let app = create_test_app().await;

    let (status, accepted) = upload(&app, "products", "items.xml", "<items/>").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let finished = wait_for_job(&app, accepted["job_id"].as_str().unwrap()).await;
    assert_eq!(finished["failed"], true);
    assert_eq!(
        finished["status"],
        "Upload failed: Unsupported file format: xml"
    );
}

#[tokio::test]
async fn test_unknown_upload_status_is_not_found() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/uploads/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
