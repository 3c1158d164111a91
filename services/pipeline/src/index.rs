//! Country/year index over the per-country table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::parser::CountryRecord;

/// Minimum number of reporting countries for a year to count as covered.
pub const DEFAULT_MIN_COVERAGE: usize = 60;

/// The metrics carried per country and year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Co2,
    Co2PerCapita,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Co2 => "co2",
            Metric::Co2PerCapita => "co2_per_capita",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "co2" => Ok(Metric::Co2),
            "co2_per_capita" => Ok(Metric::Co2PerCapita),
            other => Err(format!("unknown metric '{}'", other)),
        }
    }
}

/// Metric values for one country and year. `None` means no data, never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricBundle {
    pub co2: Option<f64>,
    pub co2_per_capita: Option<f64>,
}

impl MetricBundle {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Co2 => self.co2,
            Metric::Co2PerCapita => self.co2_per_capita,
        }
    }
}

/// Years with enough reporting countries, plus the year a map should open on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageFilterResult {
    pub covered_years: Vec<i32>,
    /// Last covered year, or the most recent known year when none is covered.
    /// `None` only for an empty index.
    pub latest_covered_year: Option<i32>,
}

/// Country → year → metrics, with the sorted set of every year present.
///
/// Built once from validated records and read-only afterwards. Every country
/// has at least one year, and every year used by any country is in `years`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountryYearIndex {
    years: Vec<i32>,
    by_country: BTreeMap<String, BTreeMap<i32, MetricBundle>>,
}

impl CountryYearIndex {
    /// Fold records into an index. A later record for the same country and
    /// year replaces the earlier one (last write wins).
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = CountryRecord>,
    {
        let by_country = records.into_iter().fold(
            BTreeMap::<String, BTreeMap<i32, MetricBundle>>::new(),
            |mut acc, record| {
                acc.entry(record.country).or_default().insert(
                    record.year,
                    MetricBundle {
                        co2: record.co2,
                        co2_per_capita: record.co2_per_capita,
                    },
                );
                acc
            },
        );

        let years: BTreeSet<i32> = by_country
            .values()
            .flat_map(|per_year| per_year.keys().copied())
            .collect();

        CountryYearIndex {
            years: years.into_iter().collect(),
            by_country,
        }
    }

    /// Every year present, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn by_country(&self) -> &BTreeMap<String, BTreeMap<i32, MetricBundle>> {
        &self.by_country
    }

    pub fn is_empty(&self) -> bool {
        self.by_country.is_empty()
    }

    pub fn country_count(&self) -> usize {
        self.by_country.len()
    }

    pub fn bundle(&self, country: &str, year: i32) -> Option<&MetricBundle> {
        self.by_country.get(country)?.get(&year)
    }

    pub fn value(&self, country: &str, year: i32, metric: Metric) -> Option<f64> {
        self.bundle(country, year)?.get(metric)
    }

    /// Number of countries with a value for `metric` in each year.
    pub fn reporting_counts(&self, metric: Metric) -> BTreeMap<i32, usize> {
        let mut counts: BTreeMap<i32, usize> = self.years.iter().map(|&y| (y, 0)).collect();
        for per_year in self.by_country.values() {
            for (year, bundle) in per_year {
                if bundle.get(metric).is_some() {
                    *counts.entry(*year).or_default() += 1;
                }
            }
        }
        counts
    }

    /// Years in which at least `min_countries` countries report `metric`.
    pub fn coverage(&self, metric: Metric, min_countries: usize) -> CoverageFilterResult {
        let covered_years: Vec<i32> = self
            .reporting_counts(metric)
            .into_iter()
            .filter(|&(_, count)| count >= min_countries)
            .map(|(year, _)| year)
            .collect();

        let latest_covered_year = covered_years
            .last()
            .or_else(|| self.years.last())
            .copied();

        CoverageFilterResult {
            covered_years,
            latest_covered_year,
        }
    }
}
