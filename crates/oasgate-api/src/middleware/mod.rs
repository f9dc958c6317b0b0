//! # Middleware Modules
//!
//! Axum middleware functions installed by
//! [`OpenApiValidator::layer`](crate::state::OpenApiValidator::layer), plus
//! the conversions between `http` messages and the engine's request model.

pub mod metadata;
pub mod request;
pub mod response;

use axum::http::request::Parts;
use axum::http::HeaderMap;
use oasgate_core::content_type::is_json_content_type;
use oasgate_core::query::parse_query;
use oasgate_core::{ApiRequest, ContentType, RequestContext};
use serde_json::Value;

/// Largest request body buffered for validation.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Header pairs with textual values; opaque values are skipped.
fn header_pairs(headers: &HeaderMap) -> Vec<(&str, &str)> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect()
}

/// The engine's view of a request head, with the routing context the
/// metadata layer attached.
pub fn api_request(parts: &Parts) -> ApiRequest {
    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let mut request =
        ApiRequest::from_parts(parts.method.as_str(), target, header_pairs(&parts.headers));
    request.openapi = parts.extensions.get::<RequestContext>().cloned();
    request
}

fn is_json(content_type: &ContentType) -> bool {
    content_type
        .media_type()
        .is_some_and(|m| matches!(is_json_content_type(m), Ok(true)))
}

/// Parse a request body: JSON and urlencoded forms become structured
/// values, anything else is kept as text. Empty bodies are absent.
pub fn parse_request_body(
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<Option<Value>, serde_json::Error> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let content_type = ContentType::parse(content_type);
    if is_json(&content_type) {
        return serde_json::from_slice(bytes).map(Some);
    }
    let text = String::from_utf8_lossy(bytes);
    if content_type
        .media_type()
        .is_some_and(|m| m.eq_ignore_ascii_case(FORM_URLENCODED))
    {
        return Ok(Some(Value::Object(parse_query(&text))));
    }
    Ok(Some(Value::String(text.into_owned())))
}

/// Parse a response body. Bodies declared (or assumed, without a
/// content type) to be JSON but not parseable are kept as text so the
/// schema check reports them.
pub fn parse_response_body(content_type: Option<&str>, bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    let parsed = ContentType::parse(content_type);
    if !parsed.is_provided() || is_json(&parsed) {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return Some(value);
        }
    }
    Some(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    #[test]
    fn request_head_is_converted() {
        let (parts, ()) = Request::builder()
            .method("post")
            .uri("/v1/pets?limit=3")
            .header("X-Request-ID", "abc")
            .header("cookie", "session=s1")
            .body(())
            .unwrap()
            .into_parts();
        let request = api_request(&parts);
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/v1/pets");
        assert_eq!(request.query["limit"], "3");
        assert_eq!(request.headers["x-request-id"], "abc");
        assert_eq!(request.cookies["session"], "s1");
        assert!(request.openapi.is_none());
    }

    #[test]
    fn request_bodies_by_content_type() {
        assert_eq!(parse_request_body(Some("application/json"), b"").unwrap(), None);
        assert_eq!(
            parse_request_body(Some("application/json; charset=utf-8"), br#"{"a":1}"#).unwrap(),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            parse_request_body(Some("application/x-www-form-urlencoded"), b"a=1&b[c]=2").unwrap(),
            Some(json!({"a": "1", "b": {"c": "2"}}))
        );
        assert_eq!(
            parse_request_body(Some("text/plain"), b"hi").unwrap(),
            Some(json!("hi"))
        );
        assert!(parse_request_body(Some("application/json"), b"{oops").is_err());
    }

    #[test]
    fn response_bodies_fall_back_to_text() {
        assert_eq!(parse_response_body(None, b"[1]"), Some(json!([1])));
        assert_eq!(parse_response_body(Some("application/json"), b"nope"), Some(json!("nope")));
        assert_eq!(parse_response_body(Some("text/html"), b"<p>"), Some(json!("<p>")));
        assert_eq!(parse_response_body(Some("application/json"), b""), None);
    }
}
