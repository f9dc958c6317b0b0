//! # Integration Tests for oasgate-api
//!
//! Drives a petstore router through the validation layers: unmanaged
//! paths, request rejections and their error envelopes, normalized
//! requests reaching handlers, and response contract checks.

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use oasgate_api::{OpenApiValidator, ValidatedRequest};
use oasgate_core::ValidatorOptions;

const REQUEST_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../oasgate-core/tests/fixtures/petstore.yaml")
}

async fn list_pets(ValidatedRequest(request): ValidatedRequest) -> Json<Value> {
    Json(json!([{"id": request.query["limit"], "name": "rex"}]))
}

/// Echoes the name back without an `id`, which the `201` response requires.
async fn create_pet(ValidatedRequest(request): ValidatedRequest) -> (StatusCode, Json<Value>) {
    let name = request
        .body
        .as_ref()
        .and_then(|body| body.get("name"))
        .cloned()
        .unwrap_or(Value::Null);
    (StatusCode::CREATED, Json(json!({"name": name})))
}

async fn show_pet(ValidatedRequest(request): ValidatedRequest) -> Json<Value> {
    Json(json!({"id": request.params["petId"], "name": "rex"}))
}

/// Helper: build the petstore app with the given options.
fn test_app_with(options: &ValidatorOptions) -> Router {
    let validator = OpenApiValidator::from_path(&fixture(), options).unwrap();
    let router = Router::new()
        .route("/v1/pets", get(list_pets).post(create_pet))
        .route("/v1/pets/{pet_id}", get(show_pet))
        .route("/health", get(|| async { "ok" }))
        .fallback(|| async { StatusCode::NOT_FOUND });
    validator.layer(router)
}

/// Helper: request validation only (the default options).
fn test_app() -> Router {
    test_app_with(&ValidatorOptions::default())
}

/// Helper: request and response validation.
fn test_app_checking_responses() -> Router {
    let options = ValidatorOptions::from_yaml_str("validateResponses: true\n").unwrap();
    test_app_with(&options)
}

/// Helper: read response body as JSON.
async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn create_request(content_type: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/pets")
        .header("content-type", content_type)
        .header("x-request-id", REQUEST_ID)
        .body(Body::from(body.to_string()))
        .unwrap()
}

// -- Unmanaged paths ----------------------------------------------------------

#[tokio::test]
async fn test_unmanaged_path_passes_through() {
    let response = test_app().oneshot(get_request("/health?x=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_ignored_paths_skip_validation() {
    let options = ValidatorOptions::from_yaml_str("ignorePaths: ^/v1/pets$\n").unwrap();
    let response = test_app_with(&options)
        .oneshot(get_request("/v1/pets?foo=1"))
        .await
        .unwrap();
    // The handler runs without a validated request in its extensions.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}

// -- Request rejections -------------------------------------------------------

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = test_app().oneshot(get_request("/v1/owners")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_undeclared_method_is_405() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/v1/pets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_unknown_query_parameter_is_400() {
    let response = test_app().oneshot(get_request("/v1/pets?foo=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNKNOWN_QUERY_PARAMETER");
    assert_eq!(body["error"]["details"][0]["path"], ".query.foo");
}

#[tokio::test]
async fn test_schema_violation_lists_errors() {
    let response = test_app()
        .oneshot(get_request("/v1/pets?limit=500"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "REQUEST_VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["path"], ".query.limit");
    assert_eq!(
        body["error"]["details"][0]["errorCode"],
        "maximum.openapi.validation"
    );
}

#[tokio::test]
async fn test_malformed_json_body_is_400() {
    let response = test_app()
        .oneshot(create_request("application/json", "{oops"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unsupported_media_type_is_415() {
    let response = test_app()
        .oneshot(create_request("text/plain", "rex"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["details"][0]["path"], ".headers.content-type");
}

// -- Normalized requests ------------------------------------------------------

#[tokio::test]
async fn test_handler_sees_defaults_and_coerced_values() {
    let response = test_app().oneshot(get_request("/v1/pets")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([{"id": 20, "name": "rex"}]));

    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/v1/pets/7")
                .header("cookie", "session=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], 7);
}

#[tokio::test]
async fn test_valid_body_reaches_handler() {
    let response = test_app()
        .oneshot(create_request("application/json", r#"{"name":"rex"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!({"name": "rex"}));
}

// -- Response validation ------------------------------------------------------

#[tokio::test]
async fn test_conforming_response_passes() {
    let response = test_app_checking_responses()
        .oneshot(get_request("/v1/pets?limit=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([{"id": 3, "name": "rex"}]));
}

#[tokio::test]
async fn test_contract_violation_becomes_500() {
    let response = test_app_checking_responses()
        .oneshot(create_request("application/json", r#"{"name":"rex"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "RESPONSE_VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["path"], ".response.id");
}

#[tokio::test]
async fn test_rejections_are_not_checked_as_responses() {
    let response = test_app_checking_responses()
        .oneshot(get_request("/v1/pets?foo=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
