use reqwest::StatusCode;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    config::SeedConfig,
    seed::{self, SeedReport},
    upstream::{Method, Route, Upstream, UpstreamRequest},
};

use super::ReconciliationState;

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub auth_token: String,
    pub pacing: Duration,
}

impl From<&SeedConfig> for SeedOptions {
    fn from(cfg: &SeedConfig) -> Self {
        Self {
            auth_token: cfg.auth_token.clone(),
            pacing: cfg.pacing(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Labels of the reports created, in creation order.
    pub created: Vec<String>,
    /// Labels with the status or error that prevented creation.
    pub failed: Vec<String>,
}

impl SeedSummary {
    pub fn attempted(&self) -> usize {
        self.created.len() + self.failed.len()
    }
}

/// What a seeding pass did. Never an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Listing the collection returned a non-2xx status.
    UpstreamUnavailable { status: StatusCode },
    /// A delete-all was just confirmed; this pass was skipped.
    SuppressedAfterDeleteAll,
    AlreadyAttempted,
    /// Every seed key is already present.
    AlreadySeeded,
    Seeded(SeedSummary),
    /// The pass hit a transport failure; the attempt flag was reset.
    Aborted { reason: String },
}

/// Backfill missing sample reports, at most once per process lifetime.
pub async fn run(
    upstream: &dyn Upstream,
    state: &ReconciliationState,
    options: &SeedOptions,
) -> SeedOutcome {
    let outcome = match seed_missing(upstream, state, options, seed::catalog()).await {
        Ok(outcome) => outcome,
        Err(reason) => {
            error!(%reason, "failed to initialize weather API data");
            state.set_initialization_attempted(false);
            SeedOutcome::Aborted { reason }
        }
    };

    log_outcome(&outcome);
    outcome
}

async fn seed_missing(
    upstream: &dyn Upstream,
    state: &ReconciliationState,
    options: &SeedOptions,
    catalog: &[SeedReport],
) -> Result<SeedOutcome, String> {
    let current = upstream
        .send(UpstreamRequest::get(Route::Collection))
        .await
        .map_err(|e| e.to_string())?;

    if !current.is_success() {
        return Ok(SeedOutcome::UpstreamUnavailable {
            status: current.status,
        });
    }

    if state.take_just_deleted_all() {
        // The next list read re-evaluates seeding.
        state.set_initialization_attempted(false);
        return Ok(SeedOutcome::SuppressedAfterDeleteAll);
    }

    if state.initialization_attempted() {
        return Ok(SeedOutcome::AlreadyAttempted);
    }

    let present = seed::present_keys(&current.body);
    let to_create = seed::missing(catalog, &present);

    if to_create.is_empty() {
        state.set_initialization_attempted(true);
        return Ok(SeedOutcome::AlreadySeeded);
    }

    // Set before any create call to narrow the window for a concurrent pass.
    state.set_initialization_attempted(true);

    let labels: Vec<String> = to_create.iter().map(|s| s.label()).collect();
    info!(
        missing = to_create.len(),
        total = catalog.len(),
        reports = %labels.join("; "),
        "creating missing sample reports"
    );

    let mut summary = SeedSummary::default();
    let count = to_create.len();

    for (i, report) in to_create.into_iter().enumerate() {
        let label = report.label();
        match create_one(upstream, options, report).await {
            Ok(()) => {
                info!(step = i + 1, of = count, report = %label, "created sample report");
                summary.created.push(label);
            }
            Err(reason) => {
                warn!(step = i + 1, of = count, report = %label, %reason, "failed to create sample report");
                summary.failed.push(format!("{label} ({reason})"));
            }
        }

        if i + 1 < count {
            tokio::time::sleep(options.pacing).await;
        }
    }

    Ok(SeedOutcome::Seeded(summary))
}

async fn create_one(
    upstream: &dyn Upstream,
    options: &SeedOptions,
    report: &SeedReport,
) -> Result<(), String> {
    let body = serde_json::to_value(report.to_new_report()).map_err(|e| e.to_string())?;
    let request = UpstreamRequest::new(Method::Post, Route::Collection)
        .with_auth(Some(options.auth_token.clone()))
        .with_body(body);

    let response = upstream
        .send(request)
        .await
        .map_err(|e| format!("Error: {e}"))?;

    if response.is_success() {
        Ok(())
    } else {
        Err(format!("Status: {}", response.status.as_u16()))
    }
}

fn log_outcome(outcome: &SeedOutcome) {
    match outcome {
        SeedOutcome::UpstreamUnavailable { status } => {
            info!(status = status.as_u16(), "weather API not accessible, skipping initialization")
        }
        SeedOutcome::SuppressedAfterDeleteAll => {
            info!("delete all just happened, skipping immediate initialization")
        }
        SeedOutcome::AlreadyAttempted => info!("initialization already attempted, skipping"),
        SeedOutcome::AlreadySeeded => {
            info!("weather API already has all sample reports, skipping initialization")
        }
        SeedOutcome::Seeded(summary) => {
            info!(
                created = summary.created.len(),
                attempted = summary.attempted(),
                "initialization complete"
            );
            if !summary.failed.is_empty() {
                error!(failed = %summary.failed.join(", "), "some sample reports were not created");
            }
        }
        SeedOutcome::Aborted { .. } => {}
    }
}
