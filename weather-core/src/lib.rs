//! Core library for the weather report proxy.
//!
//! This crate defines:
//! - Configuration handling
//! - The client adapter for the external weather API
//! - Seeding and delete reconciliation against that API
//! - Proxy dispatch shaping replies for the inbound HTTP layer
//!
//! It is used by `weather-server`, but can also be reused by other binaries or services.

pub mod config;
pub mod model;
pub mod proxy;
pub mod reconcile;
pub mod seed;
pub mod upstream;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{Config, SeedConfig};
pub use model::{Condition, NewWeatherReport, WeatherReport};
pub use proxy::{CachePolicy, ProxyReply, ReportFilter, WeatherProxy};
pub use reconcile::{ReconciliationState, SeedOptions, SeedOutcome};
pub use upstream::{HttpUpstream, Upstream};
