//! Point queries and per-year map views over the country index.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::index::{CountryYearIndex, Metric};
use crate::numeric::to_whole_i32;
use crate::parser::normalize_country_code;

/// Look up one metric value. Total over its inputs: anything unknown or
/// malformed gives `None`.
///
/// `None` covers an unknown country, a year the country never reported, a
/// metric that was not recorded, an unknown metric name, and a year that is
/// not a finite, non-negative whole number.
pub fn get_metric_value(
    index: &CountryYearIndex,
    country_id: &str,
    year: f64,
    metric_name: &str,
) -> Option<f64> {
    if !year.is_finite() || year < 0.0 {
        return None;
    }
    let year = to_whole_i32(year)?;
    let country = normalize_country_code(country_id)?;
    let metric: Metric = metric_name.parse().ok()?;

    index.value(&country, year, metric)
}

/// One metric across every reporting country for a single year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearView {
    pub year: i32,
    pub metric: Metric,
    pub values: BTreeMap<String, f64>,
    /// Smallest and largest reported value, for scaling a colour ramp.
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub fn year_view(index: &CountryYearIndex, year: i32, metric: Metric) -> YearView {
    let values: BTreeMap<String, f64> = index
        .by_country()
        .iter()
        .filter_map(|(country, per_year)| {
            let value = per_year.get(&year)?.get(metric)?;
            Some((country.clone(), value))
        })
        .collect();

    let min = values.values().copied().reduce(f64::min);
    let max = values.values().copied().reduce(f64::max);

    YearView {
        year,
        metric,
        values,
        min,
        max,
    }
}
