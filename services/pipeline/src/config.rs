use std::time::Duration;

use tracing::warn;

use crate::forecast::DEFAULT_HORIZON;
use crate::index::DEFAULT_MIN_COVERAGE;

pub const DEFAULT_SERIES_URL: &str = "https://global-warming.org/api/co2-api";
pub const DEFAULT_SERIES_FIELD: &str = "co2";
pub const DEFAULT_EMISSIONS_CSV_URL: &str =
    "https://raw.githubusercontent.com/owid/co2-data/master/owid-co2-data.csv";
pub const DEFAULT_BOUNDARIES_URL: &str =
    "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_110m_admin_0_countries.geojson";

/// Where the inputs live and how the derived views are shaped.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub series_url: String,
    /// Key of the record list inside the series document.
    pub series_field: String,
    pub emissions_csv_url: String,
    pub boundaries_url: String,
    pub fetch_timeout: Duration,
    pub min_coverage: usize,
    pub forecast_horizon: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            series_url: DEFAULT_SERIES_URL.to_string(),
            series_field: DEFAULT_SERIES_FIELD.to_string(),
            emissions_csv_url: DEFAULT_EMISSIONS_CSV_URL.to_string(),
            boundaries_url: DEFAULT_BOUNDARIES_URL.to_string(),
            fetch_timeout: Duration::from_secs(120),
            min_coverage: DEFAULT_MIN_COVERAGE,
            forecast_horizon: DEFAULT_HORIZON,
        }
    }
}

impl PipelineConfig {
    /// Read settings from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PipelineConfig::from_env`] with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            series_url: lookup("CO2_SERIES_URL").unwrap_or(defaults.series_url),
            series_field: lookup("CO2_SERIES_FIELD").unwrap_or(defaults.series_field),
            emissions_csv_url: lookup("EMISSIONS_CSV_URL").unwrap_or(defaults.emissions_csv_url),
            boundaries_url: lookup("BOUNDARIES_URL").unwrap_or(defaults.boundaries_url),
            fetch_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )),
            min_coverage: parse_or(&lookup, "MIN_COVERAGE", defaults.min_coverage),
            forecast_horizon: parse_or(&lookup, "FORECAST_HORIZON", defaults.forecast_horizon),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, fallback = %default, "ignoring unparseable setting");
            default
        }),
        None => default,
    }
}
