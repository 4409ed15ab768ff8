use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Args, Parser, Subcommand};
use inquire::{Confirm, CustomType, Text};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use weather_core::{
    Condition, Config, HttpUpstream, ReportFilter, SeedOptions, SeedOutcome, WeatherProxy,
    WeatherReport, model::UNKNOWN_CONDITION_EMOJI,
};

use crate::http;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather report proxy")]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ApiArgs {
    /// Base URL of the weather API; overrides config and WEATHER_API_URL.
    #[arg(long)]
    api_url: Option<String>,
}

impl ApiArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(url) = &self.api_url {
            cfg.api_base_url = url.clone();
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the proxy server.
    Serve {
        /// Address to listen on, e.g. "127.0.0.1:3000".
        #[arg(long)]
        listen: Option<String>,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Interactively edit and save the configuration.
    Configure,

    /// Backfill missing sample reports once and report what happened.
    Seed {
        #[command(flatten)]
        api: ApiArgs,
    },

    /// List reports through the proxy.
    #[command(group(ArgGroup::new("filter").args(["id", "city", "country"])))]
    List {
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        country: Option<String>,

        #[command(flatten)]
        api: ApiArgs,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve { listen, api } => {
                let cfg = load_config(&api)?;
                let listen = listen.unwrap_or_else(|| cfg.listen_addr.clone());
                let proxy = build_proxy(&cfg, cfg.seed.enabled)?;

                http::serve(proxy, &listen)
                    .await
                    .with_context(|| format!("Failed to run server on {listen}"))?;
            }
            Command::Configure => configure()?,
            Command::Seed { api } => {
                let cfg = load_config(&api)?;
                let proxy = build_proxy(&cfg, true)?;

                if let Some(outcome) = proxy.seed().await {
                    println!("{}", describe_outcome(&outcome));
                }
            }
            Command::List {
                id,
                city,
                country,
                api,
            } => {
                let cfg = load_config(&api)?;
                let proxy = build_proxy(&cfg, cfg.seed.enabled)?;
                let reply = proxy.list(&ReportFilter { id, city, country }).await;

                if !reply.status.is_success() {
                    bail!(
                        "Listing reports failed with status {}: {}",
                        reply.status,
                        reply.body
                    );
                }

                let lines: Vec<String> = report_items(reply.body)
                    .iter()
                    .filter_map(format_item)
                    .collect();
                if lines.is_empty() {
                    println!("No weather reports.");
                }
                for line in &lines {
                    println!("{line}");
                }
            }
        }

        Ok(())
    }
}

fn load_config(api: &ApiArgs) -> Result<Config> {
    let mut cfg = Config::load_with_env()?;
    api.apply(&mut cfg);
    Ok(cfg)
}

fn build_proxy(cfg: &Config, seeding: bool) -> Result<WeatherProxy> {
    let upstream = HttpUpstream::from_base_url(&cfg.api_base_url)?;
    let proxy = WeatherProxy::new(Arc::new(upstream), cfg.api_base_url.trim());

    Ok(if seeding {
        proxy.with_seeding(SeedOptions::from(&cfg.seed))
    } else {
        proxy
    })
}

fn configure() -> Result<()> {
    let mut cfg = Config::load()?;

    cfg.api_base_url = Text::new("Weather API base URL:")
        .with_default(&cfg.api_base_url)
        .prompt()?;
    cfg.api_base_url()?;

    cfg.listen_addr = Text::new("Listen address:")
        .with_default(&cfg.listen_addr)
        .prompt()?;

    cfg.seed.enabled = Confirm::new("Backfill sample reports on first list?")
        .with_default(cfg.seed.enabled)
        .prompt()?;

    if cfg.seed.enabled {
        cfg.seed.auth_token = Text::new("Token for creating sample reports:")
            .with_default(&cfg.seed.auth_token)
            .prompt()?;
        cfg.seed.pacing_ms = CustomType::<u64>::new("Delay between creates (ms):")
            .with_default(cfg.seed.pacing_ms)
            .prompt()?;
    }

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn describe_outcome(outcome: &SeedOutcome) -> String {
    match outcome {
        SeedOutcome::UpstreamUnavailable { status } => {
            format!("Weather API answered {status}; nothing seeded.")
        }
        SeedOutcome::SuppressedAfterDeleteAll => "Skipped: reports were just deleted.".to_string(),
        SeedOutcome::AlreadyAttempted => "Skipped: seeding already ran.".to_string(),
        SeedOutcome::AlreadySeeded => "All sample reports are already present.".to_string(),
        SeedOutcome::Seeded(summary) => {
            let mut out = format!(
                "Created {}/{} sample reports.",
                summary.created.len(),
                summary.attempted()
            );
            for failed in &summary.failed {
                out.push_str(&format!("\n  failed: {failed}"));
            }
            out
        }
        SeedOutcome::Aborted { reason } => format!("Seeding aborted: {reason}"),
    }
}

/// A list body, or a single report from an id lookup.
fn report_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        single => vec![single],
    }
}

/// One line per item. A report that misses the schema (unknown condition,
/// odd timestamp) still gets a line from its raw fields; non-objects are
/// skipped.
fn format_item(item: &Value) -> Option<String> {
    match serde_json::from_value::<WeatherReport>(item.clone()) {
        Ok(report) => Some(format_report(&report)),
        Err(e) if item.is_object() => {
            debug!(error = %e, id = %item["id"], "listing report outside the schema");
            Some(format_loose(item))
        }
        Err(e) => {
            debug!(error = %e, "skipping non-report item");
            None
        }
    }
}

fn format_loose(item: &Value) -> String {
    let text = |key: &str| match &item[key] {
        Value::String(s) => s.clone(),
        Value::Null => "?".to_string(),
        other => other.to_string(),
    };
    let emoji = serde_json::from_value::<Condition>(item["condition"].clone())
        .map(|c| c.emoji())
        .unwrap_or(UNKNOWN_CONDITION_EMOJI);

    let mut line = format!("{emoji} {}, {}", text("city"), text("country"));
    if let Some(temperature) = item["temperature"].as_f64() {
        line.push_str(&format!(": {temperature:.1}°C"));
    }
    if let Some(condition) = item["condition"].as_str() {
        line.push_str(&format!(" ({condition})"));
    }
    line.push_str(&format!(" [{}]", text("id")));
    line
}

fn format_report(report: &WeatherReport) -> String {
    let mut line = format!(
        "{} {}, {}: {:.1}°C ({}) [{}]",
        report.condition.emoji(),
        report.city,
        report.country,
        report.temperature,
        report.condition,
        report.id,
    );
    if let Some(owner) = report.owner_id() {
        line.push_str(&format!(" by {owner}"));
    }
    if let Some(created) = report.created_at {
        line.push_str(&format!(" at {}", created.format("%Y-%m-%d %H:%M UTC")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use weather_core::reconcile::SeedSummary;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_filters_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["weather", "list", "--city", "Oslo", "--country", "Norway"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn api_url_flag_overrides_config() {
        let cli = Cli::try_parse_from(["weather", "seed", "--api-url", "http://10.0.0.5:6000"])
            .expect("should parse");
        let Command::Seed { api } = cli.command else {
            panic!("expected seed command");
        };
        let mut cfg = Config::default();
        api.apply(&mut cfg);
        assert_eq!(cfg.api_base_url, "http://10.0.0.5:6000");
    }

    #[test]
    fn build_proxy_rejects_bad_base_url() {
        let cfg = Config {
            api_base_url: "localhost:6000".into(),
            ..Config::default()
        };
        assert!(build_proxy(&cfg, true).is_err());
    }

    #[test]
    fn single_and_list_bodies_yield_items() {
        let one = json!({
            "id": "a", "city": "Madrid", "country": "Spain",
            "temperature": 28, "condition": "sunny", "userId": "user-1"
        });

        assert_eq!(report_items(one.clone()).len(), 1);
        assert_eq!(report_items(json!([one.clone(), one])).len(), 2);
        assert!(report_items(json!([])).is_empty());
    }

    #[test]
    fn one_odd_report_does_not_hide_the_rest() {
        let body = json!([
            {
                "id": "a", "city": "Madrid", "country": "Spain",
                "temperature": 28, "condition": "sunny"
            },
            {
                "id": "b", "city": "Reykjavik", "country": "Iceland",
                "temperature": 3, "condition": "foggy"
            },
            {
                "id": "c", "city": "Oslo", "country": "Norway",
                "temperature": -2, "condition": "snowy", "createdAt": "yesterday"
            },
            "garbage"
        ]);

        let lines: Vec<String> = report_items(body).iter().filter_map(format_item).collect();

        assert_eq!(
            lines,
            vec![
                "☀️ Madrid, Spain: 28.0°C (sunny) [a]",
                "🌡️ Reykjavik, Iceland: 3.0°C (foggy) [b]",
                "❄️ Oslo, Norway: -2.0°C (snowy) [c]",
            ]
        );
    }

    #[test]
    fn format_report_line() {
        let report: WeatherReport = serde_json::from_value(json!({
            "id": "a", "city": "chamonix", "country": "France",
            "temperature": -5, "condition": "snowy", "userId": "user-1",
            "createdAt": "2025-03-01T08:30:00Z"
        }))
        .expect("report");

        assert_eq!(
            format_report(&report),
            "❄️ chamonix, France: -5.0°C (snowy) [a] by user-1 at 2025-03-01 08:30 UTC"
        );
    }

    #[test]
    fn describe_partial_seed() {
        let outcome = SeedOutcome::Seeded(SeedSummary {
            created: vec!["Madrid, Spain".into()],
            failed: vec!["london, UK (Status: 400)".into()],
        });

        assert_eq!(
            describe_outcome(&outcome),
            "Created 1/2 sample reports.\n  failed: london, UK (Status: 400)"
        );
    }
}
