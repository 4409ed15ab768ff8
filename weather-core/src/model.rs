use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shown for a condition outside the known set.
pub const UNKNOWN_CONDITION_EMOJI: &str = "🌡️";

/// Sky condition as accepted by the weather API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Sunny,
    Rainy,
    Cloudy,
    Stormy,
    Snowy,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Sunny => "sunny",
            Condition::Rainy => "rainy",
            Condition::Cloudy => "cloudy",
            Condition::Stormy => "stormy",
            Condition::Snowy => "snowy",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Condition::Sunny => "☀️",
            Condition::Rainy => "🌧️",
            Condition::Cloudy => "☁️",
            Condition::Stormy => "⛈️",
            Condition::Snowy => "❄️",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner record embedded by newer API versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOwner {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// A weather report as stored by the external API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub id: String,
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ReportOwner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl WeatherReport {
    /// `userId` when present, else the embedded owner's id.
    pub fn owner_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or_else(|| self.user.as_ref().map(|u| u.id.as_str()))
    }
}

/// Payload for creating a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWeatherReport {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub condition: Condition,
    pub user_id: String,
}
