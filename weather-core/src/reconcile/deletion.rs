//! The weather API sometimes answers a delete that went through with a 500.
//! When that happens we read the target back: if it is gone, the delete is
//! treated as done.

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::upstream::{
    Method, Route, TransportError, Upstream, UpstreamRequest, UpstreamResponse,
};

use super::ReconciliationState;

/// Result of the read-back after an ambiguous delete.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadBack {
    /// The original status did not warrant a read-back.
    NotRun,
    Completed(UpstreamResponse),
    /// The read-back itself failed to reach the API.
    Inconclusive,
}

impl From<Result<UpstreamResponse, TransportError>> for ReadBack {
    fn from(result: Result<UpstreamResponse, TransportError>) -> Self {
        match result {
            Ok(response) => ReadBack::Completed(response),
            Err(_) => ReadBack::Inconclusive,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteResolution {
    Deleted,
    /// The delete failed; carries the original upstream response unchanged.
    Failed(UpstreamResponse),
}

impl DeleteResolution {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteResolution::Deleted)
    }
}

/// Only a generic server error is worth a read-back.
pub fn needs_read_back(original: &UpstreamResponse) -> bool {
    original.status == StatusCode::INTERNAL_SERVER_ERROR
}

/// Single-item delete: a 500 followed by a 404 on read-back counts as deleted.
pub fn resolve_item(original: UpstreamResponse, read_back: ReadBack) -> DeleteResolution {
    if original.is_success() {
        return DeleteResolution::Deleted;
    }

    match read_back {
        ReadBack::Completed(check)
            if needs_read_back(&original) && check.status == StatusCode::NOT_FOUND =>
        {
            DeleteResolution::Deleted
        }
        _ => DeleteResolution::Failed(original),
    }
}

/// Delete-all: a 500 followed by an empty collection on read-back counts as
/// deleted.
pub fn resolve_all(original: UpstreamResponse, read_back: ReadBack) -> DeleteResolution {
    if original.is_success() {
        return DeleteResolution::Deleted;
    }

    match read_back {
        ReadBack::Completed(check)
            if needs_read_back(&original)
                && check.status == StatusCode::OK
                && check.body.as_array().is_some_and(|items| items.is_empty()) =>
        {
            DeleteResolution::Deleted
        }
        _ => DeleteResolution::Failed(original),
    }
}

/// Delete one report, reading it back if the API answers 500.
///
/// Fails only when the delete call itself could not reach the API.
pub async fn delete_item(
    upstream: &dyn Upstream,
    id: &str,
    auth: Option<String>,
) -> Result<DeleteResolution, TransportError> {
    let route = Route::Item(id.to_string());
    let original = upstream
        .send(UpstreamRequest::new(Method::Delete, route.clone()).with_auth(auth))
        .await?;

    let read_back = if needs_read_back(&original) {
        ReadBack::from(upstream.send(UpstreamRequest::get(route)).await)
    } else {
        ReadBack::NotRun
    };

    let resolution = resolve_item(original, read_back.clone());
    log_resolution("delete", id, &resolution, &read_back);
    Ok(resolution)
}

/// Delete every report, reading the collection back if the API answers 500.
///
/// A confirmed delete-all marks `state` so the next list read skips seeding.
pub async fn delete_all(
    upstream: &dyn Upstream,
    state: &ReconciliationState,
    auth: Option<String>,
) -> Result<DeleteResolution, TransportError> {
    let original = upstream
        .send(UpstreamRequest::new(Method::Delete, Route::Collection).with_auth(auth))
        .await?;

    let read_back = if needs_read_back(&original) {
        let _suspended = state.suspend_initialization();
        ReadBack::from(upstream.send(UpstreamRequest::get(Route::Collection)).await)
    } else {
        ReadBack::NotRun
    };

    let resolution = resolve_all(original, read_back.clone());
    if resolution.is_deleted() {
        state.mark_deleted_all();
    }
    log_resolution("delete all", "*", &resolution, &read_back);
    Ok(resolution)
}

fn log_resolution(
    op: &str,
    target: &str,
    resolution: &DeleteResolution,
    read_back: &ReadBack,
) {
    match (resolution, read_back) {
        (DeleteResolution::Deleted, ReadBack::Completed(_)) => {
            info!(op, target, "delete succeeded despite 500 from weather API")
        }
        (DeleteResolution::Deleted, _) => info!(op, target, "delete succeeded"),
        (DeleteResolution::Failed(_), ReadBack::Inconclusive) => {
            warn!(op, target, "could not verify delete status, reporting original error")
        }
        (DeleteResolution::Failed(original), _) => {
            warn!(op, target, status = original.status.as_u16(), "delete failed")
        }
    }
}
