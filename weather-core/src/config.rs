use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:6000";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_SEED_AUTH_TOKEN: &str = "JOECOOL123";
pub const DEFAULT_SEED_PACING_MS: u64 = 100;

/// Environment variable overriding `api_base_url`.
pub const API_URL_ENV: &str = "WEATHER_API_URL";

/// Settings for backfilling the sample reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub enabled: bool,
    /// Token sent in `x-auth-weather` when creating sample reports.
    pub auth_token: String,
    /// Delay between consecutive create calls.
    pub pacing_ms: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_token: DEFAULT_SEED_AUTH_TOKEN.to_string(),
            pacing_ms: DEFAULT_SEED_PACING_MS,
        }
    }
}

impl SeedConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_base_url = "http://127.0.0.1:6000"
/// listen_addr = "127.0.0.1:3000"
///
/// [seed]
/// enabled = true
/// auth_token = "..."
/// pacing_ms = 100
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub listen_addr: String,
    pub seed: SeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            seed: SeedConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load from disk, then apply environment overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut cfg = Self::load()?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Apply overrides from a variable lookup. Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-proxy", "weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Parse and check `api_base_url`.
    pub fn api_base_url(&self) -> Result<Url> {
        parse_base_url(&self.api_base_url)
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .with_context(|| format!("Invalid weather API base URL '{raw}'"))?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "Unsupported scheme '{}' in weather API base URL '{raw}'.\n\
             Hint: use an http:// or https:// URL.",
            url.scheme()
        );
    }
    if url.cannot_be_a_base() {
        bail!("Weather API base URL '{raw}' cannot be used as a base");
    }

    Ok(url)
}
