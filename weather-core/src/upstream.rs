//! Outbound side of the proxy: the request/response contract with the
//! external weather API and the body-shape rules every caller relies on.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::fmt::Debug;
use thiserror::Error;

pub mod http;

pub use http::HttpUpstream;

/// Header carrying the bearer-style token understood by the weather API.
pub const AUTH_HEADER: &str = "x-auth-weather";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource addressed on the weather API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/weather`
    Collection,
    /// `/weather/{id}`
    Item(String),
    /// `/weather/city/{city}`
    ByCity(String),
    /// `/weather/country/{country}`
    ByCountry(String),
}

impl Route {
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Route::Collection => vec!["weather"],
            Route::Item(id) => vec!["weather", id],
            Route::ByCity(city) => vec!["weather", "city", city],
            Route::ByCountry(country) => vec!["weather", "country", country],
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub route: Route,
    pub auth: Option<String>,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn new(method: Method, route: Route) -> Self {
        Self {
            method,
            route,
            auth: None,
            body: None,
        }
    }

    pub fn get(route: Route) -> Self {
        Self::new(Method::Get, route)
    }

    pub fn with_auth(mut self, auth: Option<String>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status and normalized body of a completed upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Build a response from a raw body, applying [`normalize_body`].
    pub fn from_raw(method: Method, status: StatusCode, raw: &str) -> Self {
        Self::new(status, normalize_body(method, raw))
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The call never produced an HTTP response (connection refused, DNS, reset).
#[derive(Debug, Error)]
#[error("request to {url} failed: {source}")]
pub struct TransportError {
    pub url: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    pub fn new(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// Client for the external weather API.
///
/// Implementations resolve with the upstream status for every HTTP outcome,
/// including 4xx and 5xx, and only fail when no response was received.
#[async_trait]
pub trait Upstream: Send + Sync + Debug {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// Decide the body shape for a method.
///
/// GET and DELETE bodies that are empty or not JSON become `[]`; for other
/// methods they become `{}`. DELETE bodies are always list-shaped: a parsed
/// non-array DELETE body is replaced by `[]`.
pub fn normalize_body(method: Method, raw: &str) -> Value {
    let fallback = || match method {
        Method::Get | Method::Delete => Value::Array(Vec::new()),
        Method::Post | Method::Patch => Value::Object(Map::new()),
    };

    if raw.trim().is_empty() {
        return fallback();
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value) if method == Method::Delete && !value.is_array() => Value::Array(Vec::new()),
        Ok(value) => value,
        Err(_) => fallback(),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_delete_body_becomes_list() {
        assert_eq!(normalize_body(Method::Delete, ""), json!([]));
        assert_eq!(normalize_body(Method::Delete, "  \n"), json!([]));
    }

    #[test]
    fn unparsable_delete_body_becomes_list() {
        assert_eq!(normalize_body(Method::Delete, "Internal Server Error"), json!([]));
    }

    #[test]
    fn object_delete_body_becomes_list() {
        let raw = r#"{"statusCode":500,"message":"Cannot read properties of undefined"}"#;
        assert_eq!(normalize_body(Method::Delete, raw), json!([]));
    }

    #[test]
    fn list_delete_body_is_kept() {
        let raw = r#"[{"id":"1"}]"#;
        assert_eq!(normalize_body(Method::Delete, raw), json!([{ "id": "1" }]));
    }

    #[test]
    fn empty_or_garbled_get_body_becomes_list() {
        assert_eq!(normalize_body(Method::Get, ""), json!([]));
        assert_eq!(normalize_body(Method::Get, "<html>"), json!([]));
    }

    #[test]
    fn get_object_body_is_kept() {
        let raw = r#"{"id":"7","city":"Madrid"}"#;
        assert_eq!(normalize_body(Method::Get, raw), json!({ "id": "7", "city": "Madrid" }));
    }

    #[test]
    fn empty_or_garbled_write_body_becomes_object() {
        assert_eq!(normalize_body(Method::Post, ""), json!({}));
        assert_eq!(normalize_body(Method::Patch, "not json"), json!({}));
    }

    #[test]
    fn route_segments() {
        assert_eq!(Route::Collection.segments(), vec!["weather"]);
        assert_eq!(Route::ByCity("New York".into()).segments(), vec!["weather", "city", "New York"]);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(250);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
