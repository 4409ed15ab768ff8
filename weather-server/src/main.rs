//! Binary crate for the `weather` proxy server.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Serving the inbound HTTP API
//! - Interactive configuration
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod http;
mod telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    telemetry::init(cmd.log_json);
    cmd.run().await
}
