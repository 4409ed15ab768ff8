//! Fixed catalog of sample reports used to backfill an empty backend.

use serde_json::Value;
use std::collections::HashSet;

use crate::model::{Condition, NewWeatherReport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedReport {
    pub city: &'static str,
    pub country: &'static str,
    pub temperature: f64,
    pub condition: Condition,
    pub user_id: &'static str,
}

impl SeedReport {
    pub fn key(&self) -> SeedKey {
        SeedKey::new(self.city, self.country)
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }

    pub fn to_new_report(&self) -> NewWeatherReport {
        NewWeatherReport {
            city: self.city.to_string(),
            country: self.country.to_string(),
            temperature: self.temperature,
            condition: self.condition,
            user_id: self.user_id.to_string(),
        }
    }
}

const CATALOG: [SeedReport; 6] = [
    SeedReport {
        city: "chamonix",
        country: "France",
        temperature: -5.0,
        condition: Condition::Snowy,
        user_id: "user-1",
    },
    SeedReport {
        city: "london",
        country: "UK",
        temperature: 10.4312,
        condition: Condition::Rainy,
        user_id: "user-2",
    },
    SeedReport {
        city: "Tokyo",
        country: "Japan",
        temperature: 15.0,
        condition: Condition::Cloudy,
        user_id: "user-3",
    },
    SeedReport {
        city: "Tokyo",
        country: "Japan",
        temperature: 34.0,
        condition: Condition::Sunny,
        user_id: "user-3",
    },
    SeedReport {
        city: "New York",
        country: "USA",
        temperature: 22.0,
        condition: Condition::Stormy,
        user_id: "user-3",
    },
    SeedReport {
        city: "Madrid",
        country: "Spain",
        temperature: 28.0,
        condition: Condition::Sunny,
        user_id: "user-1",
    },
];

/// Sample reports, in creation order.
pub fn catalog() -> &'static [SeedReport] {
    &CATALOG
}

/// Case-insensitive (city, country) identity used to match seeds against
/// existing reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedKey {
    city: String,
    country: String,
}

impl SeedKey {
    pub fn new(city: &str, country: &str) -> Self {
        Self {
            city: city.to_lowercase(),
            country: country.to_lowercase(),
        }
    }

    /// Key of a raw report; `None` when `city` or `country` is not a string.
    pub fn from_report(report: &Value) -> Option<Self> {
        let city = report.get("city")?.as_str()?;
        let country = report.get("country")?.as_str()?;
        Some(Self::new(city, country))
    }
}

impl std::fmt::Display for SeedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.city, self.country)
    }
}

/// Keys present in a collection body. Non-array bodies count as empty.
pub fn present_keys(collection: &Value) -> HashSet<SeedKey> {
    collection
        .as_array()
        .map(|items| items.iter().filter_map(SeedKey::from_report).collect())
        .unwrap_or_default()
}

/// Catalog entries whose key is absent from `present`, in catalog order.
pub fn missing<'a>(catalog: &'a [SeedReport], present: &HashSet<SeedKey>) -> Vec<&'a SeedReport> {
    catalog
        .iter()
        .filter(|seed| !present.contains(&seed.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_has_six_reports() {
        assert_eq!(catalog().len(), 6);
        assert_eq!(catalog()[0].city, "chamonix");
        assert_eq!(catalog()[5].city, "Madrid");
    }

    #[test]
    fn keys_ignore_case() {
        assert_eq!(SeedKey::new("LONDON", "uk"), SeedKey::new("london", "UK"));
        assert_eq!(SeedKey::new("New York", "USA").to_string(), "new york,usa");
    }

    #[test]
    fn present_keys_skip_items_without_location() {
        let body = json!([
            { "city": "Madrid", "country": "Spain" },
            { "city": "Lima" },
            { "city": 4, "country": "Peru" },
        ]);

        let keys = present_keys(&body);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&SeedKey::new("madrid", "spain")));
    }

    #[test]
    fn non_array_collection_counts_as_empty() {
        assert!(present_keys(&json!({ "error": "boom" })).is_empty());
    }

    #[test]
    fn missing_keeps_catalog_order_and_duplicate_keys() {
        let present = present_keys(&json!([{ "city": "CHAMONIX", "country": "france" }]));
        let cities: Vec<_> = missing(catalog(), &present).iter().map(|s| s.city).collect();

        assert_eq!(cities, vec!["london", "Tokyo", "Tokyo", "New York", "Madrid"]);
    }

    #[test]
    fn one_tokyo_report_satisfies_both_tokyo_seeds() {
        let present = present_keys(&json!([{ "city": "tokyo", "country": "japan" }]));
        assert!(missing(catalog(), &present).iter().all(|s| s.city != "Tokyo"));
    }
}
