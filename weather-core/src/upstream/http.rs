use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url, header::CONTENT_TYPE};
use tracing::debug;

use crate::config::parse_base_url;

use super::{
    AUTH_HEADER, Method, Route, TransportError, Upstream, UpstreamRequest, UpstreamResponse,
    truncate_body,
};

/// Reqwest-backed client for the weather API. No request timeout is set;
/// calls rely on the transport's own defaults.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    base_url: Url,
    http: Client,
}

impl HttpUpstream {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http: Client::new(),
        }
    }

    pub fn from_base_url(raw: &str) -> Result<Self> {
        Ok(Self::new(parse_base_url(raw)?))
    }

    /// Resolve a route against the base URL, percent-encoding each segment.
    pub fn url_for(&self, route: &Route) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(route.segments());
        }
        url
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let url = self.url_for(&request.route);
        debug!(method = %request.method, %url, "calling weather API");

        let mut builder = self.http.request(to_reqwest(request.method), url.clone());
        if let Some(token) = &request.auth {
            builder = builder.header(AUTH_HEADER, token);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let res = builder
            .send()
            .await
            .map_err(|e| TransportError::new(url.as_str(), e))?;

        let status = res.status();
        let raw = res
            .text()
            .await
            .map_err(|e| TransportError::new(url.as_str(), e))?;

        debug!(
            method = %request.method,
            %url,
            status = status.as_u16(),
            body = %truncate_body(&raw),
            "weather API responded"
        );

        Ok(UpstreamResponse::from_raw(request.method, status, &raw))
    }
}
