//! Raw record parsing for both input datasets.
//!
//! The two datasets are validated asymmetrically:
//! - per-country rows are lenient: a valid country and year keep the row even
//!   when both metrics are missing
//! - atmospheric rows are strict: any unusable date component or value drops
//!   the whole row, since a point without a date cannot be ordered or averaged

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Dataset, PipelineError};
use crate::numeric::{parse_finite_number, parse_finite_str, to_whole_i32};

/// Columns the per-country table must carry. Any other column is ignored.
pub const COUNTRY_TABLE_COLUMNS: &[&str] = &["iso_code", "year", "co2", "co2_per_capita"];

// =============================================================================
// PER-COUNTRY TABLE
// =============================================================================

/// One untyped row of the per-country table, borrowed from the CSV record.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCountryRow<'a> {
    pub iso_code: &'a str,
    pub year: &'a str,
    pub co2: &'a str,
    pub co2_per_capita: &'a str,
}

/// A validated per-country row. Metrics are individually optional.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRecord {
    pub country: String,
    pub year: i32,
    pub co2: Option<f64>,
    pub co2_per_capita: Option<f64>,
}

/// Normalize a country identifier, keeping only 3-character codes.
///
/// Length is the only check: aggregate rows in the source (`OWID_WRL`,
/// `OWID_EUR`, blank codes for continents) are longer or empty, so this
/// filters them. It is not a real ISO 3166 validation.
pub fn normalize_country_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    if code.chars().count() == 3 {
        Some(code)
    } else {
        None
    }
}

impl CountryRecord {
    /// Validate a raw row. `None` means the row is filtered out.
    pub fn from_raw(raw: &RawCountryRow<'_>) -> Option<Self> {
        let country = normalize_country_code(raw.iso_code)?;
        let year = parse_finite_str(raw.year).and_then(to_whole_i32)?;

        Some(CountryRecord {
            country,
            year,
            co2: parse_finite_str(raw.co2),
            co2_per_capita: parse_finite_str(raw.co2_per_capita),
        })
    }
}

/// Parse the per-country CSV table into validated records, in file order.
///
/// Fails only if a required column is missing or no row survives validation.
pub fn parse_country_table(content: &str) -> Result<Vec<CountryRecord>, PipelineError> {
    // Remove UTF-8 BOM if present
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::empty(Dataset::CountryTable, format!("unreadable header row: {}", e)))?
        .clone();

    let mut positions = [0usize; 4];
    for (slot, column) in positions.iter_mut().zip(COUNTRY_TABLE_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                PipelineError::empty(
                    Dataset::CountryTable,
                    format!("missing required column '{}'", column),
                )
            })?;
    }
    let [iso_col, year_col, co2_col, per_capita_col] = positions;

    let mut records = Vec::new();
    let mut total = 0usize;

    for (line_idx, result) in reader.records().enumerate() {
        total += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(line = line_idx + 2, error = %e, "skipping unreadable CSV line");
                continue;
            }
        };

        let raw = RawCountryRow {
            iso_code: record.get(iso_col).unwrap_or(""),
            year: record.get(year_col).unwrap_or(""),
            co2: record.get(co2_col).unwrap_or(""),
            co2_per_capita: record.get(per_capita_col).unwrap_or(""),
        };

        if let Some(parsed) = CountryRecord::from_raw(&raw) {
            records.push(parsed);
        }
    }

    info!(
        usable = records.len(),
        skipped = total - records.len(),
        "parsed per-country table"
    );

    if records.is_empty() {
        return Err(PipelineError::empty(
            Dataset::CountryTable,
            format!("none of {} rows carried a 3-letter country code and a year", total),
        ));
    }

    Ok(records)
}

// =============================================================================
// ATMOSPHERIC SERIES
// =============================================================================

/// One untyped record of the atmospheric series. Any field may be a number,
/// a string, null, or missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSeriesRow {
    #[serde(default)]
    pub year: Value,
    #[serde(default)]
    pub month: Value,
    #[serde(default)]
    pub day: Value,
    #[serde(default)]
    pub trend: Value,
    #[serde(default)]
    pub cycle: Value,
}

/// A validated observation of atmospheric CO₂.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub year: i32,
    pub value: f64,
}

impl TimeSeriesPoint {
    /// Validate a raw record. Any unusable date component or value drops it.
    pub fn from_raw(raw: &RawSeriesRow) -> Option<Self> {
        let year = parse_finite_number(&raw.year).and_then(to_whole_i32)?;
        let month = parse_finite_number(&raw.month).and_then(to_whole_i32)?;
        let day = parse_finite_number(&raw.day).and_then(to_whole_i32)?;
        let value = parse_finite_number(&raw.trend).or_else(|| parse_finite_number(&raw.cycle))?;

        let date = NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)?;

        Some(TimeSeriesPoint { date, year, value })
    }
}

/// Parse the atmospheric series document. `field` names the key that holds
/// the record list (`co2` for the public feed).
///
/// Returned points are sorted by date; records with equal dates keep their
/// document order.
pub fn parse_series(payload: &str, field: &str) -> Result<Vec<TimeSeriesPoint>, PipelineError> {
    let document: Value = serde_json::from_str(payload).map_err(|e| {
        PipelineError::empty(Dataset::Series, format!("payload is not valid JSON: {}", e))
    })?;

    let rows = document
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            PipelineError::empty(Dataset::Series, format!("no record list under field '{}'", field))
        })?;

    let mut points: Vec<TimeSeriesPoint> = rows
        .iter()
        .filter_map(|row| RawSeriesRow::deserialize(row).ok())
        .filter_map(|raw| TimeSeriesPoint::from_raw(&raw))
        .collect();

    points.sort_by_key(|p| p.date);

    info!(
        usable = points.len(),
        skipped = rows.len() - points.len(),
        "parsed atmospheric series"
    );

    if points.is_empty() {
        return Err(PipelineError::empty(
            Dataset::Series,
            format!("none of {} records had a valid date and value", rows.len()),
        ));
    }

    Ok(points)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HEADER: &str = "country,year,iso_code,population,co2,co2_per_capita";

    fn table(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out.push('\n');
        out
    }

    // -------------------------------------------------------------------------
    // PER-COUNTRY TABLE
    // -------------------------------------------------------------------------

    #[test]
    fn test_country_row_basic() {
        let csv = table(&["Chile,2021,CHL,19493184,90.1,4.62"]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(
            records,
            vec![CountryRecord {
                country: "CHL".to_string(),
                year: 2021,
                co2: Some(90.1),
                co2_per_capita: Some(4.62),
            }]
        );
    }

    #[test]
    fn test_country_code_uppercased() {
        let csv = table(&["Chile,2021, chl ,19493184,90.1,4.62"]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records[0].country, "CHL");
    }

    #[test]
    fn test_aggregate_codes_skipped() {
        let csv = table(&[
            "World,2021,OWID_WRL,7900000000,37123.0,4.69",
            "Africa,2021,,1390000000,1460.0,1.05",
            "Peru,2021,PER,33715471,56.0,1.66",
        ]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country, "PER");
    }

    #[test]
    fn test_missing_metrics_keep_row() {
        let csv = table(&["Chile,1850,CHL,1500000,,"]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].co2, None);
        assert_eq!(records[0].co2_per_capita, None);
    }

    #[test]
    fn test_zero_metric_is_data() {
        let csv = table(&["Tuvalu,1950,TUV,5000,0,0.0"]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records[0].co2, Some(0.0));
        assert_eq!(records[0].co2_per_capita, Some(0.0));
    }

    #[test]
    fn test_bad_year_rejected() {
        let csv = table(&[
            "Chile,,CHL,1,1,1",
            "Chile,NaN,CHL,1,1,1",
            "Chile,2020.5,CHL,1,1,1",
            "Chile,2020,CHL,1,1,1",
        ]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].year, 2020);
    }

    #[test]
    fn test_non_finite_metric_nulled() {
        let csv = table(&["Chile,2020,CHL,1,inf,abc"]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records[0].co2, None);
        assert_eq!(records[0].co2_per_capita, None);
    }

    #[test]
    fn test_country_table_with_bom() {
        let csv = format!("\u{feff}{}", table(&["Chile,2021,CHL,1,90.1,4.62"]));
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_short_rows_tolerated() {
        let csv = table(&["Chile,2021,CHL,1,90.1"]);
        let records = parse_country_table(&csv).unwrap();
        assert_eq!(records[0].co2, Some(90.1));
        assert_eq!(records[0].co2_per_capita, None);
    }

    #[test]
    fn test_missing_column_fails() {
        let csv = "iso_code,year,co2\nCHL,2021,90.1\n";
        let err = parse_country_table(csv).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset { .. }));
        assert!(err.to_string().contains("co2_per_capita"));
    }

    #[test]
    fn test_no_usable_rows_fails() {
        let csv = table(&["World,2021,OWID_WRL,1,1,1"]);
        let err = parse_country_table(&csv).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyDataset { dataset: Dataset::CountryTable, .. }
        ));
    }

    #[test]
    fn test_header_only_fails() {
        assert!(parse_country_table(HEADER).is_err());
    }

    // -------------------------------------------------------------------------
    // ATMOSPHERIC SERIES
    // -------------------------------------------------------------------------

    fn series(rows: Value) -> String {
        json!({ "co2": rows }).to_string()
    }

    #[test]
    fn test_series_trend_preferred() {
        let payload = series(json!([
            { "year": "2024", "month": "1", "day": "2", "cycle": "421.9", "trend": "420.5" }
        ]));
        let points = parse_series(&payload, "co2").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 420.5);
        assert_eq!(points[0].year, 2024);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_series_cycle_fallback() {
        let payload = series(json!([
            { "year": 2024, "month": 1, "day": 2, "cycle": 421.9, "trend": "" }
        ]));
        let points = parse_series(&payload, "co2").unwrap();
        assert_eq!(points[0].value, 421.9);
    }

    #[test]
    fn test_series_partial_rows_dropped() {
        let payload = series(json!([
            { "year": "2024", "month": "1", "day": "", "trend": "420.5" },
            { "year": "2024", "month": null, "day": "3", "trend": "420.5" },
            { "month": "1", "day": "3", "trend": "420.5" },
            { "year": "2024", "month": "1", "day": "4" },
            { "year": "2024", "month": "1", "day": "5", "trend": "420.7" }
        ]));
        let points = parse_series(&payload, "co2").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].date.to_string(), "2024-01-05");
    }

    #[test]
    fn test_series_invalid_calendar_date_dropped() {
        let payload = series(json!([
            { "year": "2023", "month": "2", "day": "30", "trend": "419.0" },
            { "year": "2023", "month": "13", "day": "1", "trend": "419.0" },
            { "year": "2023", "month": "-1", "day": "1", "trend": "419.0" },
            { "year": "2023", "month": "3", "day": "1", "trend": "419.0" }
        ]));
        let points = parse_series(&payload, "co2").unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_series_zero_value_kept() {
        let payload = series(json!([{ "year": 2024, "month": 1, "day": 1, "trend": 0 }]));
        let points = parse_series(&payload, "co2").unwrap();
        assert_eq!(points[0].value, 0.0);
    }

    #[test]
    fn test_series_sorted_by_date() {
        let payload = series(json!([
            { "year": 2024, "month": 3, "day": 1, "trend": 3.0 },
            { "year": 2023, "month": 12, "day": 31, "trend": 1.0 },
            { "year": 2024, "month": 1, "day": 1, "trend": 2.0 }
        ]));
        let values: Vec<f64> = parse_series(&payload, "co2")
            .unwrap()
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_series_non_object_rows_skipped() {
        let payload = series(json!([42, "x", { "year": 2024, "month": 1, "day": 1, "trend": 1.0 }]));
        assert_eq!(parse_series(&payload, "co2").unwrap().len(), 1);
    }

    #[test]
    fn test_series_custom_field() {
        let payload = json!({ "data": [{ "year": 2024, "month": 1, "day": 1, "trend": 1.0 }] }).to_string();
        assert_eq!(parse_series(&payload, "data").unwrap().len(), 1);
        assert!(parse_series(&payload, "co2").is_err());
    }

    #[test]
    fn test_series_invalid_json_fails() {
        let err = parse_series("<html>not found</html>", "co2").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_series_no_usable_rows_fails() {
        let payload = series(json!([{ "year": "x", "month": 1, "day": 1, "trend": 1.0 }]));
        let err = parse_series(&payload, "co2").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset { dataset: Dataset::Series, .. }));
    }
}
