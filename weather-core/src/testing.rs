//! In-memory stand-in for the weather API, for tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use crate::upstream::{
    Method, Route, TransportError, Upstream, UpstreamRequest, UpstreamResponse,
};

#[derive(Debug, Default)]
struct Inner {
    reports: Vec<Value>,
    next_id: u64,
    offline: bool,
    required_token: Option<String>,
    list_failure: Option<StatusCode>,
    delete_failure: Option<StatusCode>,
    false_delete_500: bool,
    rejected_cities: HashMap<String, StatusCode>,
    requests: Vec<UpstreamRequest>,
}

/// Behaves like the weather API, with switches for its known failure modes.
#[derive(Debug, Default)]
pub struct InMemoryUpstream {
    inner: Mutex<Inner>,
}

impl InMemoryUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `reports`; items without an `id` get one assigned.
    pub fn with_reports(reports: Vec<Value>) -> Self {
        let upstream = Self::new();
        {
            let mut inner = upstream.lock();
            for report in reports {
                inner.insert(report);
            }
        }
        upstream
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("in-memory upstream lock poisoned")
    }

    /// Refuse every call with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Answer 401 to writes that do not carry `token`.
    pub fn require_token(&self, token: &str) {
        self.lock().required_token = Some(token.to_string());
    }

    /// Answer `GET /weather` with `status`.
    pub fn fail_list_with(&self, status: StatusCode) {
        self.lock().list_failure = Some(status);
    }

    /// Answer deletes with `status` without deleting anything.
    pub fn fail_deletes_with(&self, status: StatusCode) {
        self.lock().delete_failure = Some(status);
    }

    /// Perform deletes but answer them with a 500.
    pub fn delete_reports_500_after_success(&self, enabled: bool) {
        self.lock().false_delete_500 = enabled;
    }

    /// Answer creates for `city` (case-insensitive) with `status`.
    pub fn reject_creates_for(&self, city: &str, status: StatusCode) {
        self.lock().rejected_cities.insert(city.to_lowercase(), status);
    }

    pub fn reports(&self) -> Vec<Value> {
        self.lock().reports.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.lock().requests.clone()
    }

    fn creates(&self) -> Vec<UpstreamRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Post)
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.creates().len()
    }

    pub fn created_bodies(&self) -> Vec<Value> {
        self.creates().into_iter().filter_map(|r| r.body).collect()
    }

    pub fn create_auth_tokens(&self) -> Vec<Option<String>> {
        self.creates().into_iter().map(|r| r.auth).collect()
    }
}

impl Inner {
    fn insert(&mut self, mut report: Value) -> Value {
        if let Some(obj) = report.as_object_mut() {
            if !obj.contains_key("id") {
                self.next_id += 1;
                obj.insert("id".into(), Value::String(format!("r{}", self.next_id)));
            }
        }
        self.reports.push(report.clone());
        report
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.reports
            .iter()
            .position(|r| r.get("id").and_then(Value::as_str) == Some(id))
    }

    fn filter_by(&self, field: &str, value: &str) -> Vec<Value> {
        let wanted = value.to_lowercase();
        self.reports
            .iter()
            .filter(|r| {
                r.get(field)
                    .and_then(Value::as_str)
                    .is_some_and(|v| v.to_lowercase() == wanted)
            })
            .cloned()
            .collect()
    }

    fn authorized(&self, request: &UpstreamRequest) -> bool {
        match &self.required_token {
            Some(token) => request.auth.as_deref() == Some(token.as_str()),
            None => true,
        }
    }

    fn handle(&mut self, request: &UpstreamRequest) -> (StatusCode, String) {
        let not_found = || (StatusCode::NOT_FOUND, json!({ "message": "Not found" }).to_string());

        if request.method != Method::Get && !self.authorized(request) {
            return (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Unauthorized" }).to_string(),
            );
        }

        match (request.method, &request.route) {
            (Method::Get, Route::Collection) => match self.list_failure {
                Some(status) => (status, json!({ "message": "unavailable" }).to_string()),
                None => (StatusCode::OK, Value::Array(self.reports.clone()).to_string()),
            },
            (Method::Get, Route::Item(id)) => match self.position(id) {
                Some(idx) => (StatusCode::OK, self.reports[idx].to_string()),
                None => not_found(),
            },
            (Method::Get, Route::ByCity(city)) => {
                (StatusCode::OK, Value::Array(self.filter_by("city", city)).to_string())
            }
            (Method::Get, Route::ByCountry(country)) => (
                StatusCode::OK,
                Value::Array(self.filter_by("country", country)).to_string(),
            ),
            (Method::Post, Route::Collection) => {
                let body = request.body.clone().unwrap_or_else(|| json!({}));
                let city = body
                    .get("city")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase();
                if let Some(status) = self.rejected_cities.get(&city) {
                    return (*status, json!({ "message": "rejected" }).to_string());
                }
                let created = self.insert(body);
                (StatusCode::CREATED, created.to_string())
            }
            (Method::Patch, Route::Item(id)) => {
                let Some(idx) = self.position(id) else {
                    return not_found();
                };
                if let (Some(target), Some(Value::Object(changes))) =
                    (self.reports[idx].as_object_mut(), request.body.as_ref())
                {
                    for (k, v) in changes {
                        if k != "id" {
                            target.insert(k.clone(), v.clone());
                        }
                    }
                }
                (StatusCode::OK, self.reports[idx].to_string())
            }
            (Method::Delete, route) => {
                if let Some(status) = self.delete_failure {
                    return (status, json!({ "message": "delete failed" }).to_string());
                }
                match route {
                    Route::Collection => self.reports.clear(),
                    Route::Item(id) => match self.position(id) {
                        Some(idx) => {
                            self.reports.remove(idx);
                        }
                        None => return not_found(),
                    },
                    _ => return not_found(),
                }
                if self.false_delete_500 {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "statusCode": 500, "message": "Internal server error" })
                            .to_string(),
                    )
                } else {
                    (StatusCode::OK, String::new())
                }
            }
            _ => not_found(),
        }
    }
}

#[async_trait]
impl Upstream for InMemoryUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(TransportError::new(
                format!("memory://weather/{}", request.route.segments().join("/")),
                "connection refused",
            ));
        }
        inner.requests.push(request.clone());
        let (status, raw) = inner.handle(&request);
        Ok(UpstreamResponse::from_raw(request.method, status, &raw))
    }
}
