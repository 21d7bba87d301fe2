//! Upstream failure description
//!
//! Turns a response whose status did not match the expected one into a
//! [`RequestFailure`]: a human readable message plus the structured context
//! of the exchange (request and response sides).

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::http::builder::RequestBody;

/// Documented meaning of the status codes the Zenodo API returns
pub fn status_description(status: u16) -> Option<&'static str> {
    let description = match status {
        200 => "Request succeeded. Response included. Usually sent for GET/PUT/PATCH requests.",
        201 => "Request succeeded. Response included. Usually sent for POST requests.",
        202 => "Request succeeded. Response included. Usually sent for POST requests, where background processing is needed to fulfill the request.",
        204 => "Request succeeded. No response included. Usually sent for DELETE requests.",
        400 => "Request failed. Error response included.",
        401 => "Request failed, due to an invalid access token. Error response included.",
        403 => "Request failed, due to missing authorization (e.g. deleting an already submitted upload or missing scopes for your access token). Error response included.",
        404 => "Request failed, due to the resource not being found. Error response included.",
        405 => "Request failed, due to unsupported HTTP method. Error response included.",
        409 => "Request failed, due to the current state of the resource (e.g. edit a deposition which is not fully integrated). Error response included.",
        415 => "Request failed, due to missing or invalid request header Content-Type. Error response included.",
        429 => "Request failed, due to rate limiting. Error response included.",
        500 => "Request failed, due to an internal server error. Error response NOT included. Zenodo admins have been notified and will be dealing with the problem ASAP.",
        _ => return None,
    };
    Some(description)
}

/// Canonical reason phrase, empty when the code has none
pub fn status_text(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

/// Structured error for a non-retryable or budget-exhausted upstream status
#[derive(Debug, Clone)]
pub struct RequestFailure {
    /// `"<base description>: <detail>"`, or the base description alone
    pub message: String,
    pub url: String,
    pub method: Method,
    pub content_type: Option<String>,
    /// Body the caller sent
    pub request_body: Option<RequestBody>,
    /// Raw response body, when it could be read
    pub response_body: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// Detail extracted from a JSON error body
    pub detail: Option<String>,
}

/// Request side of a failed exchange
#[derive(Debug, Clone)]
pub struct FailedRequest {
    pub url: String,
    pub method: Method,
    pub content_type: Option<String>,
    pub body: Option<RequestBody>,
}

impl RequestFailure {
    /// Build the failure from both sides of the exchange
    ///
    /// `response_body` is `None` when reading the body failed; that only
    /// removes the detail, it never prevents the failure from being built.
    pub fn new(
        request: FailedRequest,
        status: u16,
        headers: &HeaderMap,
        response_body: Option<String>,
    ) -> Self {
        let status_text = status_text(status);
        let base = status_description(status)
            .map(str::to_string)
            .unwrap_or_else(|| status_text.clone());

        let detail = response_body
            .as_deref()
            .and_then(parse_json_body)
            .and_then(|json| extract_detail(&json));

        let message = match &detail {
            Some(detail) => format!("{}: {}", base, detail),
            None => base,
        };

        Self {
            message,
            url: request.url,
            method: request.method,
            content_type: request.content_type,
            request_body: request.body,
            response_body,
            status,
            status_text,
            headers: header_map_to_plain(headers),
            detail,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn is_authentication_error(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn parse_json_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(body).ok()
}

/// Pull the most useful error detail out of a JSON error body
///
/// Looks for `message`, then `error`, then an `errors` array, and falls back
/// to the whole object. Non-object bodies carry no detail.
pub fn extract_detail(json: &Value) -> Option<String> {
    let object = json.as_object()?;

    if let Some(message) = object.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(error) = object.get("error").and_then(Value::as_str) {
        return Some(error.to_string());
    }
    if let Some(errors) = object.get("errors").and_then(Value::as_array) {
        return Some(join_errors(errors));
    }
    Some(json.to_string())
}

fn join_errors(errors: &[Value]) -> String {
    errors
        .iter()
        .map(stringify_error)
        .collect::<Vec<_>>()
        .join(", ")
}

fn stringify_error(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => join_errors(items),
        other => other.to_string(),
    }
}

fn header_map_to_plain(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut plain = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        plain
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    plain
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE};
    use serde_json::json;

    fn request() -> FailedRequest {
        FailedRequest {
            url: "https://sandbox.zenodo.org/api/deposit/depositions".to_string(),
            method: Method::POST,
            content_type: Some("application/json".to_string()),
            body: Some(RequestBody::Text("{}".to_string())),
        }
    }

    #[test]
    fn test_message_field_wins() {
        let body = json!({"message": "Validation error.", "error": "ignored"});
        assert_eq!(extract_detail(&body).as_deref(), Some("Validation error."));
    }

    #[test]
    fn test_error_field_used_without_message() {
        let body = json!({"error": "invalid_token"});
        assert_eq!(extract_detail(&body).as_deref(), Some("invalid_token"));
    }

    #[test]
    fn test_errors_array_is_joined() {
        let body = json!({
            "errors": [
                "first",
                {"field": "metadata.title", "messages": ["Required."]},
                ["nested", "list"]
            ]
        });
        assert_eq!(
            extract_detail(&body).as_deref(),
            Some(r#"first, {"field":"metadata.title","messages":["Required."]}, nested, list"#)
        );
    }

    #[test]
    fn test_object_without_known_fields_is_serialized() {
        let body = json!({"status": 400});
        assert_eq!(extract_detail(&body).as_deref(), Some(r#"{"status":400}"#));
    }

    #[test]
    fn test_non_object_json_has_no_detail() {
        assert!(extract_detail(&json!(["a", "b"])).is_none());
        assert!(extract_detail(&json!("text")).is_none());
    }

    #[test]
    fn test_failure_message_combines_description_and_detail() {
        let failure = RequestFailure::new(
            request(),
            400,
            &HeaderMap::new(),
            Some(r#"{"message": "Validation error."}"#.to_string()),
        );
        assert_eq!(
            failure.message,
            "Request failed. Error response included.: Validation error."
        );
        assert_eq!(failure.detail.as_deref(), Some("Validation error."));
        assert_eq!(failure.status_text, "Bad Request");
    }

    #[test]
    fn test_unparseable_body_falls_back_to_description() {
        let failure =
            RequestFailure::new(request(), 404, &HeaderMap::new(), Some("<html>".to_string()));
        assert_eq!(
            failure.message,
            "Request failed, due to the resource not being found. Error response included."
        );
        assert!(failure.detail.is_none());
        assert_eq!(failure.response_body.as_deref(), Some("<html>"));
    }

    #[test]
    fn test_unmapped_status_uses_status_text() {
        let failure = RequestFailure::new(request(), 502, &HeaderMap::new(), None);
        assert_eq!(failure.message, "Bad Gateway");
        assert!(failure.response_body.is_none());
    }

    #[test]
    fn test_failure_keeps_request_context_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append("x-trace", HeaderValue::from_static("a"));
        headers.append("x-trace", HeaderValue::from_static("b"));

        let failure = RequestFailure::new(request(), 409, &headers, Some(String::new()));
        assert_eq!(failure.url, "https://sandbox.zenodo.org/api/deposit/depositions");
        assert_eq!(failure.method, Method::POST);
        assert_eq!(failure.content_type.as_deref(), Some("application/json"));
        assert!(matches!(failure.request_body, Some(RequestBody::Text(ref t)) if t == "{}"));
        assert_eq!(failure.headers.get("content-type").unwrap(), "application/json");
        assert_eq!(failure.headers.get("x-trace").unwrap(), "a, b");
        assert_eq!(failure.to_string(), failure.message);
    }
}
