//! Pipeline - Turns raw CO₂ datasets into analytical views
//!
//! Responsibilities:
//! - Parse the atmospheric series (JSON) and per-country table (CSV) into typed records
//! - Index per-country records by country and year, with coverage filtering
//! - Average the atmospheric series per year, fit a trend line and project it forward
//! - Answer point queries over the index without ever failing
//! - Fetch the static inputs over HTTP and cache the parsed results
//!
//! Row-level malformation is filtered, never raised. Only transport failures and
//! datasets with no usable rows surface as [`PipelineError`].

pub mod annual;
pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod forecast;
pub mod geo;
pub mod index;
pub mod lookup;
pub mod numeric;
pub mod parser;
pub mod regression;

pub use annual::{build_annual_averages, AnnualAverage};
pub use cache::{DatasetCache, Liveness, Loaded, RequestScope};
pub use collector::Collector;
pub use config::PipelineConfig;
pub use error::{Dataset, PipelineError};
pub use forecast::{build_forecast, build_forecast_report, ForecastPoint, ForecastReport, DEFAULT_HORIZON};
pub use geo::normalize_boundaries;
pub use index::{CountryYearIndex, CoverageFilterResult, Metric, MetricBundle, DEFAULT_MIN_COVERAGE};
pub use lookup::{get_metric_value, year_view, YearView};
pub use numeric::{parse_finite_number, parse_finite_str};
pub use parser::{parse_country_table, parse_series, CountryRecord, TimeSeriesPoint};
pub use regression::{run_linear_regression, RegressionModel};
