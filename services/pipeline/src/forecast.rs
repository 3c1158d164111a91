//! Trend forecast over the atmospheric series.

use serde::Serialize;
use tracing::debug;

use crate::annual::{build_annual_averages, AnnualAverage};
use crate::parser::TimeSeriesPoint;
use crate::regression::{run_linear_regression, RegressionModel};

/// Number of years projected when the caller does not say otherwise.
pub const DEFAULT_HORIZON: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub value: f64,
}

/// Everything a trend chart needs, borrowed from the cached series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport<'a> {
    pub series: &'a [TimeSeriesPoint],
    pub annual: Vec<AnnualAverage>,
    pub forecast: Vec<ForecastPoint>,
    pub regression: RegressionModel,
}

/// Project the model over `last_year + 1 ..= last_year + horizon`.
///
/// Exactly `horizon` points, no clamping, unless a year would pass
/// `i32::MAX`: the projection stops at the last representable year, so the
/// result is shorter. Far horizons can produce implausible values; that is
/// accepted.
pub fn build_forecast(model: &RegressionModel, last_year: i32, horizon: usize) -> Vec<ForecastPoint> {
    (1..=horizon)
        .map_while(|k| {
            let year = last_year.checked_add(i32::try_from(k).ok()?)?;
            Some(ForecastPoint {
                year,
                value: model.predict(year as f64),
            })
        })
        .collect()
}

/// Average the series per year, fit a line through the averages and
/// project it `horizon` years past the last averaged year.
///
/// The model is refitted on every call. An empty series yields the zero
/// model and no forecast, since there is no last year to project from.
pub fn build_forecast_report(series: &[TimeSeriesPoint], horizon: usize) -> ForecastReport<'_> {
    let annual = build_annual_averages(series);
    let pairs: Vec<(f64, f64)> = annual.iter().map(|a| (a.year as f64, a.value)).collect();
    let regression = run_linear_regression(&pairs);

    let forecast = match annual.last() {
        Some(last) => build_forecast(&regression, last.year, horizon),
        None => Vec::new(),
    };

    debug!(
        points = series.len(),
        years = annual.len(),
        slope = regression.slope,
        r_squared = regression.r_squared,
        horizon,
        "built forecast report"
    );

    ForecastReport {
        series,
        annual,
        forecast,
        regression,
    }
}
