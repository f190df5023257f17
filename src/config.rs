//! Pipeline configuration, loaded from a JSON file.
//!
//! ```json
//! {
//!   "cache_dir": "cache_data",
//!   "regions": [
//!     { "name": "IND", "url": "http://ind.example.com/dashboard_apis/fetch" },
//!     { "name": "NASA", "url": "http://nasa.example.com/dashboard_apis/fetch", "unit": "gallons" }
//!   ]
//! }
//! ```
//!
//! Every field other than `regions` has a default.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Liters-to-US-gallons factor applied to regions reporting in gallons.
pub const GALLON_CONVERSION: f64 = 0.264172;

/// Specialized equipment handled as the off-highway population.
pub const DEFAULT_OFF_HIGHWAY_TYPES: &[&str] = &[
    "yard_hauler",
    "yard_loader",
    "excavator",
    "boom_pump",
    "motor_grader",
    "backhoe_loader",
    "earth_mover",
    "construction_equipment",
    "trommel_machine",
    "track_loader",
    "soil_compactor",
    "horizontal_grinder",
    "diesel_forklift",
    "rig_cowl",
    "harvester",
];

/// Vehicle models whose alerts are discarded entirely.
pub const DEFAULT_EXCLUDED_MODELS: &[&str] = &[
    "1623 16T-12M BSiV",
    "2523r 6x2 (cargo) BS3",
    "2523R/2823R 6X2 BSIV",
    "3723R/4223R BSIV",
    "3128C tipper 8x4 Bs3",
    "3128C tipper 8x4 BSIV",
    "3118 IL bs3",
    "3118c BS3",
    "3118c Bs4",
    "Captain 4023 U series TT BS3",
    "3518 (tractor/trailor) BS4",
    "4928T BS3",
    "4928T (5528T) 6x4 BsIV",
    "3123R/3523R BSIV",
    "4023 4x2 BS3",
    "2523C 6x4 Transit mixer pto bsiv",
    "3723R BS3",
    "3123R BS3",
    "2441 Super High Deck BSIV",
    "1109 EX2 BS4",
    "4023T 4x2 BSIV 3600 WB",
    "4023t 4x2 Bsiv 3300 WB",
    "Ultra 1918 BS4",
    "2523C/2823C tipper 6x4 BSIV",
    "2523C 6x4  BS3",
    "2523C 6x4 transit mixer  BS3 pto",
];

/// Upper bound for `retention_days` and `freshness_offset_days`.
pub const MAX_DAYS: i64 = 3_660;

/// Upper bound for `batch_hours`.
pub const MAX_BATCH_HOURS: i64 = 24 * 366;

/// Unit the region reports `amount` in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountUnit {
    /// Already canonical.
    #[default]
    Liters,
    /// Rescaled by [`GALLON_CONVERSION`].
    Gallons,
    /// The mass-based amount column replaces `amount` when present.
    Kilograms,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub unit: AmountUnit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root of the per-region cache directories. Default: "cache_data".
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    pub regions: Vec<RegionConfig>,

    /// Width of the retained window. Default: 10 days.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// How far behind the wall clock the window ends. Default: 2 days.
    #[serde(default = "default_freshness_offset_days")]
    pub freshness_offset_days: i64,

    /// Width of each fetch sub-window. Default: 2 hours.
    #[serde(default = "default_batch_hours")]
    pub batch_hours: i64,

    /// Maximum in-flight requests per batch. Default: 30.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-request timeout. Default: 60s.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_off_highway_types")]
    pub off_highway_types: Vec<String>,

    #[serde(default = "default_excluded_models")]
    pub excluded_models: Vec<String>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache_data")
}

fn default_retention_days() -> i64 {
    10
}

fn default_freshness_offset_days() -> i64 {
    2
}

fn default_batch_hours() -> i64 {
    2
}

fn default_max_workers() -> usize {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_off_highway_types() -> Vec<String> {
    DEFAULT_OFF_HIGHWAY_TYPES.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_models() -> Vec<String> {
    DEFAULT_EXCLUDED_MODELS.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Loads and validates the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_DAYS).contains(&self.retention_days) {
            bail!(
                "retention_days must be between 1 and {MAX_DAYS}, got {}",
                self.retention_days
            );
        }
        if !(0..=MAX_DAYS).contains(&self.freshness_offset_days) {
            bail!(
                "freshness_offset_days must be between 0 and {MAX_DAYS}, got {}",
                self.freshness_offset_days
            );
        }
        if !(1..=MAX_BATCH_HOURS).contains(&self.batch_hours) {
            bail!(
                "batch_hours must be between 1 and {MAX_BATCH_HOURS}, got {}",
                self.batch_hours
            );
        }
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() {
                bail!("region name must not be empty");
            }
            if !seen.insert(region.name.as_str()) {
                bail!("duplicate region name {:?}", region.name);
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_width_ms(&self) -> i64 {
        self.batch_hours.saturating_mul(3_600_000)
    }

    pub fn region(&self, name: &str) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_json(
            r#"{"regions": [{"name": "IND", "url": "http://localhost/fetch"}]}"#,
        )
        .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("cache_data"));
        assert_eq!(config.retention_days, 10);
        assert_eq!(config.freshness_offset_days, 2);
        assert_eq!(config.batch_width_ms(), 7_200_000);
        assert_eq!(config.max_workers, 30);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.regions[0].unit, AmountUnit::Liters);
        assert!(config.off_highway_types.iter().any(|t| t == "excavator"));
        assert_eq!(config.excluded_models.len(), DEFAULT_EXCLUDED_MODELS.len());
    }

    #[test]
    fn test_unit_parsed() {
        let config = Config::from_json(
            r#"{"regions": [
                {"name": "NASA", "url": "http://a", "unit": "gallons"},
                {"name": "FML", "url": "http://b", "unit": "kilograms"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(config.region("NASA").unwrap().unit, AmountUnit::Gallons);
        assert_eq!(config.region("FML").unwrap().unit, AmountUnit::Kilograms);
        assert!(config.region("EU").is_none());
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let result = Config::from_json(
            r#"{"regions": [
                {"name": "EU", "url": "http://a"},
                {"name": "EU", "url": "http://b"}
            ]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = Config::from_json(r#"{"regions": [], "max_workers": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_widths_rejected() {
        for field in ["batch_hours", "retention_days", "freshness_offset_days"] {
            let json = format!(r#"{{"regions": [], "{field}": {}}}"#, i64::MAX);
            assert!(Config::from_json(&json).is_err(), "{field} accepted i64::MAX");
        }
        let json = format!(r#"{{"regions": [], "batch_hours": {MAX_BATCH_HOURS}}}"#);
        let config = Config::from_json(&json).unwrap();
        assert_eq!(config.batch_width_ms(), MAX_BATCH_HOURS * 3_600_000);
    }

    #[test]
    fn test_default_excluded_models_complete() {
        assert_eq!(DEFAULT_EXCLUDED_MODELS.len(), 26);
        let classifier = crate::normalize::Classifier::new(DEFAULT_OFF_HIGHWAY_TYPES, DEFAULT_EXCLUDED_MODELS);
        for model in [
            "3123R/3523R BSIV",
            "4023 4x2 BS3",
            "2523C 6x4 Transit mixer pto bsiv",
            "3723R BS3",
            "3123R BS3",
            "2441 Super High Deck BSIV",
            "1109 EX2 BS4",
        ] {
            assert_eq!(
                classifier.classify(Some("truck"), Some(model), Some("active")),
                crate::normalize::Population::Excluded(crate::normalize::Exclusion::ExcludedModel),
                "{model} not excluded"
            );
        }
    }

    #[test]
    fn test_example_config_loads() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json")).unwrap();
        let names: Vec<&str> = config.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["IND", "NASA", "EU", "FML"]);
        assert_eq!(config.region("NASA").unwrap().unit, AmountUnit::Gallons);
        assert_eq!(config.region("EU").unwrap().unit, AmountUnit::Liters);
        assert_eq!(config.region("FML").unwrap().unit, AmountUnit::Kilograms);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/fuel_alerts.json").is_err());
    }
}
