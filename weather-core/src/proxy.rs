//! Public operations of the weather proxy.
//!
//! Each operation maps onto one upstream call, runs the seeding pass ahead of
//! unfiltered list reads, reconciles delete results, and shapes the reply
//! (status, JSON body, cache policy) for the inbound layer.

use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    reconcile::{
        self, DeleteResolution, ReconciliationState, SeedOptions, SeedOutcome,
    },
    upstream::{Method, Route, TransportError, Upstream, UpstreamRequest, UpstreamResponse},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Default,
    NoStore,
}

/// Reply for the inbound layer to render as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: StatusCode,
    pub body: Value,
    pub cache: CachePolicy,
}

impl ProxyReply {
    fn new(status: StatusCode, body: Value, cache: CachePolicy) -> Self {
        Self {
            status,
            body,
            cache,
        }
    }

    fn passthrough(response: UpstreamResponse, cache: CachePolicy) -> Self {
        Self::new(response.status, response.body, cache)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
    DeleteAll,
}

impl Operation {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::List => "Failed to fetch weather data",
            Operation::Get => "Failed to fetch weather report",
            Operation::Create => "Failed to create weather report",
            Operation::Update => "Failed to update weather report",
            Operation::Delete => "Failed to delete weather report",
            Operation::DeleteAll => "Failed to delete weather reports",
        }
    }
}

/// List filters. First present of `id`, `city`, `country` wins; empty
/// strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub id: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl ReportFilter {
    pub fn route(&self) -> Route {
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

        if let Some(id) = present(&self.id) {
            Route::Item(id)
        } else if let Some(city) = present(&self.city) {
            Route::ByCity(city)
        } else if let Some(country) = present(&self.country) {
            Route::ByCountry(country)
        } else {
            Route::Collection
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.route() == Route::Collection
    }
}

/// Dispatches proxy operations to the upstream and owns the reconciliation
/// state for the hosting process.
#[derive(Debug)]
pub struct WeatherProxy {
    upstream: Arc<dyn Upstream>,
    state: ReconciliationState,
    seed: Option<SeedOptions>,
    api_location: String,
}

impl WeatherProxy {
    /// `api_location` is quoted in the hint of transport-failure replies.
    pub fn new(upstream: Arc<dyn Upstream>, api_location: impl Into<String>) -> Self {
        Self {
            upstream,
            state: ReconciliationState::new(),
            seed: None,
            api_location: api_location.into(),
        }
    }

    /// Enable seeding ahead of unfiltered list reads.
    pub fn with_seeding(mut self, options: SeedOptions) -> Self {
        self.seed = Some(options);
        self
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    /// Run one seeding pass now. `None` when seeding is disabled.
    pub async fn seed(&self) -> Option<SeedOutcome> {
        let options = self.seed.as_ref()?;
        Some(reconcile::seeding::run(self.upstream.as_ref(), &self.state, options).await)
    }

    pub async fn list(&self, filter: &ReportFilter) -> ProxyReply {
        if filter.is_unfiltered() {
            self.seed().await;
        }

        let route = filter.route();

        info!(?route, "fetching weather reports");
        match self.upstream.send(UpstreamRequest::get(route)).await {
            Ok(response) => ProxyReply::passthrough(response, CachePolicy::NoStore),
            Err(e) => self.transport_failure(Operation::List, &e),
        }
    }

    pub async fn get(&self, id: &str) -> ProxyReply {
        let request = UpstreamRequest::get(Route::Item(id.to_string()));
        match self.upstream.send(request).await {
            Ok(response) => ProxyReply::passthrough(response, CachePolicy::NoStore),
            Err(e) => self.transport_failure(Operation::Get, &e),
        }
    }

    pub async fn create(&self, body: Value, auth: Option<String>) -> ProxyReply {
        let request = UpstreamRequest::new(Method::Post, Route::Collection)
            .with_auth(auth)
            .with_body(body);
        match self.upstream.send(request).await {
            Ok(response) => ProxyReply::passthrough(response, CachePolicy::Default),
            Err(e) => self.transport_failure(Operation::Create, &e),
        }
    }

    pub async fn update(&self, id: &str, body: Value, auth: Option<String>) -> ProxyReply {
        let request = UpstreamRequest::new(Method::Patch, Route::Item(id.to_string()))
            .with_auth(auth)
            .with_body(body);
        match self.upstream.send(request).await {
            Ok(response) => ProxyReply::passthrough(response, CachePolicy::Default),
            Err(e) => self.transport_failure(Operation::Update, &e),
        }
    }

    pub async fn delete(&self, id: &str, auth: Option<String>) -> ProxyReply {
        match reconcile::deletion::delete_item(self.upstream.as_ref(), id, auth).await {
            Ok(DeleteResolution::Deleted) => ProxyReply::new(
                StatusCode::OK,
                json!({ "success": true }),
                CachePolicy::NoStore,
            ),
            Ok(DeleteResolution::Failed(original)) => ProxyReply::new(
                original.status,
                delete_error_body(&original),
                CachePolicy::NoStore,
            ),
            Err(e) => self.transport_failure(Operation::Delete, &e),
        }
    }

    pub async fn delete_all(&self, auth: Option<String>) -> ProxyReply {
        match reconcile::deletion::delete_all(self.upstream.as_ref(), &self.state, auth).await {
            Ok(DeleteResolution::Deleted) => {
                ProxyReply::new(StatusCode::OK, json!([]), CachePolicy::NoStore)
            }
            Ok(DeleteResolution::Failed(original)) => {
                ProxyReply::passthrough(original, CachePolicy::NoStore)
            }
            Err(e) => self.transport_failure(Operation::DeleteAll, &e),
        }
    }

    fn transport_failure(&self, op: Operation, err: &TransportError) -> ProxyReply {
        error!(?op, error = %err, "weather API unreachable");
        ProxyReply::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": op.failure_message(),
                "details": err.to_string(),
                "hint": format!("Make sure the weather API is running on {}", self.api_location),
            }),
            CachePolicy::Default,
        )
    }
}

fn delete_error_body(original: &UpstreamResponse) -> Value {
    let field = |name: &str| original.body.get(name).filter(|v| !v.is_null());

    let message = field("error")
        .or_else(|| field("message"))
        .and_then(Value::as_str)
        .unwrap_or_else(|| Operation::Delete.failure_message());
    let details = field("details").cloned().unwrap_or_else(|| original.body.clone());

    json!({
        "error": message,
        "details": details,
        "statusCode": original.status.as_u16(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryUpstream;
    use std::time::Duration;

    fn proxy_over(upstream: &Arc<InMemoryUpstream>) -> WeatherProxy {
        WeatherProxy::new(upstream.clone(), "http://127.0.0.1:6000").with_seeding(SeedOptions {
            auth_token: "JOECOOL123".into(),
            pacing: Duration::ZERO,
        })
    }

    fn items(reply: &ProxyReply) -> usize {
        reply.body.as_array().map(Vec::len).unwrap_or_default()
    }

    #[test]
    fn filter_priority_is_id_then_city_then_country() {
        let all = ReportFilter {
            id: Some("7".into()),
            city: Some("Oslo".into()),
            country: Some("Norway".into()),
        };
        assert_eq!(all.route(), Route::Item("7".into()));

        let no_id = ReportFilter {
            id: Some(String::new()),
            ..all.clone()
        };
        assert_eq!(no_id.route(), Route::ByCity("Oslo".into()));

        let by_country = ReportFilter {
            country: Some("Norway".into()),
            ..ReportFilter::default()
        };
        assert_eq!(by_country.route(), Route::ByCountry("Norway".into()));
        assert!(!by_country.is_unfiltered());

        let blank = ReportFilter {
            city: Some(String::new()),
            ..ReportFilter::default()
        };
        assert!(blank.is_unfiltered());
    }

    #[tokio::test]
    async fn cold_start_seeds_once_then_lists() {
        let upstream = Arc::new(InMemoryUpstream::new());
        let proxy = proxy_over(&upstream);

        let first = proxy.list(&ReportFilter::default()).await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.cache, CachePolicy::NoStore);
        assert_eq!(items(&first), 6);
        assert_eq!(upstream.create_calls(), 6);

        let second = proxy.list(&ReportFilter::default()).await;
        assert_eq!(items(&second), 6);
        assert_eq!(upstream.create_calls(), 6);
    }

    #[tokio::test]
    async fn seeded_backend_with_user_report_is_left_alone() {
        let seeded = Arc::new(InMemoryUpstream::new());
        proxy_over(&seeded).list(&ReportFilter::default()).await;
        let mut reports = seeded.reports();
        reports.push(json!({ "id": "u1", "city": "Oslo", "country": "Norway", "temperature": -2 }));

        let upstream = Arc::new(InMemoryUpstream::with_reports(reports));
        let reply = proxy_over(&upstream).list(&ReportFilter::default()).await;

        assert_eq!(items(&reply), 7);
        assert_eq!(upstream.create_calls(), 0);
    }

    #[tokio::test]
    async fn filtered_list_never_seeds() {
        let upstream = Arc::new(InMemoryUpstream::new());
        let proxy = proxy_over(&upstream);

        let by_city = ReportFilter {
            city: Some("Madrid".into()),
            ..ReportFilter::default()
        };
        let reply = proxy.list(&by_city).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(upstream.create_calls(), 0);
        assert!(!proxy.state().initialization_attempted());
    }

    #[tokio::test]
    async fn seeding_disabled_skips_creates() {
        let upstream = Arc::new(InMemoryUpstream::new());
        let proxy = WeatherProxy::new(upstream.clone(), "http://127.0.0.1:6000");

        let reply = proxy.list(&ReportFilter::default()).await;

        assert_eq!(reply.body, json!([]));
        assert!(proxy.seed().await.is_none());
        assert_eq!(upstream.create_calls(), 0);
    }

    #[tokio::test]
    async fn delete_all_then_list_suppresses_seeding_once() {
        let upstream = Arc::new(InMemoryUpstream::new());
        let proxy = proxy_over(&upstream);
        proxy.list(&ReportFilter::default()).await;

        let deleted = proxy.delete_all(Some("JOECOOL123".into())).await;
        assert_eq!(deleted.status, StatusCode::OK);
        assert_eq!(deleted.body, json!([]));

        let after = proxy.list(&ReportFilter::default()).await;
        assert_eq!(after.body, json!([]));
        assert_eq!(upstream.create_calls(), 6);

        let later = proxy.list(&ReportFilter::default()).await;
        assert_eq!(items(&later), 6);
        assert_eq!(upstream.create_calls(), 12);
    }

    #[tokio::test]
    async fn delete_all_false_500_is_reported_as_success() {
        let upstream = Arc::new(InMemoryUpstream::with_reports(vec![json!({ "city": "Oslo" })]));
        upstream.delete_reports_500_after_success(true);
        let proxy = proxy_over(&upstream);

        let reply = proxy.delete_all(None).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!([]));
        assert!(proxy.state().just_deleted_all());
    }

    #[tokio::test]
    async fn delete_all_genuine_failure_passes_through_list_body() {
        let upstream = Arc::new(InMemoryUpstream::with_reports(vec![json!({ "city": "Oslo" })]));
        upstream.fail_deletes_with(StatusCode::INTERNAL_SERVER_ERROR);
        let proxy = proxy_over(&upstream);

        let reply = proxy.delete_all(None).await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body, json!([]));
        assert!(!proxy.state().just_deleted_all());
    }

    #[tokio::test]
    async fn delete_false_500_is_reported_as_success() {
        let upstream = Arc::new(InMemoryUpstream::with_reports(vec![json!({ "id": "x" })]));
        upstream.delete_reports_500_after_success(true);
        let proxy = proxy_over(&upstream);

        let reply = proxy.delete("x", None).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!({ "success": true }));
    }

    #[tokio::test]
    async fn delete_genuine_500_keeps_status_and_shape() {
        let upstream = Arc::new(InMemoryUpstream::with_reports(vec![json!({ "id": "x" })]));
        upstream.fail_deletes_with(StatusCode::INTERNAL_SERVER_ERROR);
        let proxy = proxy_over(&upstream);

        let reply = proxy.delete("x", None).await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            reply.body,
            json!({
                "error": "Failed to delete weather report",
                "details": [],
                "statusCode": 500,
            })
        );
    }

    #[tokio::test]
    async fn create_without_token_passes_upstream_401_through() {
        let upstream = Arc::new(InMemoryUpstream::new());
        upstream.require_token("JOECOOL123");
        let proxy = proxy_over(&upstream);

        let denied = proxy.create(json!({ "city": "Oslo" }), None).await;
        assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
        assert_eq!(denied.body, json!({ "message": "Unauthorized" }));

        let created = proxy
            .create(json!({ "city": "Oslo" }), Some("JOECOOL123".into()))
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.cache, CachePolicy::Default);
        assert_eq!(upstream.requests()[1].auth.as_deref(), Some("JOECOOL123"));
    }

    #[tokio::test]
    async fn update_and_get_pass_through() {
        let upstream = Arc::new(InMemoryUpstream::with_reports(vec![
            json!({ "id": "x", "city": "Oslo", "temperature": 1 }),
        ]));
        let proxy = proxy_over(&upstream);

        let updated = proxy.update("x", json!({ "temperature": 3 }), None).await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["temperature"], 3);

        let fetched = proxy.get("x").await;
        assert_eq!(fetched.body["temperature"], 3);

        let missing = proxy.get("nope").await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped_with_hint() {
        let upstream = Arc::new(InMemoryUpstream::new());
        upstream.set_offline(true);
        let proxy = proxy_over(&upstream);

        let reply = proxy.list(&ReportFilter::default()).await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body["error"], "Failed to fetch weather data");
        assert!(reply.body["details"].as_str().is_some_and(|d| d.contains("connection refused")));
        assert_eq!(
            reply.body["hint"],
            "Make sure the weather API is running on http://127.0.0.1:6000"
        );

        let reply = proxy.delete_all(None).await;
        assert_eq!(reply.body["error"], "Failed to delete weather reports");
    }
}
