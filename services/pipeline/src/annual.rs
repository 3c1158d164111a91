use std::collections::BTreeMap;

use serde::Serialize;

use crate::parser::TimeSeriesPoint;

/// Mean of every observation falling in one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualAverage {
    pub year: i32,
    pub value: f64,
}

/// Collapse a series of any granularity into one average per year, ascending.
///
/// Input order does not matter. Years without observations do not appear.
pub fn build_annual_averages(points: &[TimeSeriesPoint]) -> Vec<AnnualAverage> {
    let mut groups: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for p in points {
        let entry = groups.entry(p.year).or_insert((0.0, 0));
        entry.0 += p.value;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .filter(|&(_, (_, count))| count > 0)
        .map(|(year, (sum, count))| AnnualAverage {
            year,
            value: sum / count as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(year: i32, month: u32, value: f64) -> TimeSeriesPoint {
        TimeSeriesPoint {
            date: NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
            year,
            value,
        }
    }

    #[test]
    fn test_two_years_means() {
        let points = vec![
            point(2020, 1, 410.0),
            point(2020, 6, 412.0),
            point(2020, 12, 414.0),
            point(2021, 1, 415.0),
            point(2021, 2, 417.0),
        ];
        let annual = build_annual_averages(&points);
        assert_eq!(
            annual,
            vec![
                AnnualAverage { year: 2020, value: 412.0 },
                AnnualAverage { year: 2021, value: 416.0 },
            ]
        );
    }

    #[test]
    fn test_order_independent() {
        let points = vec![
            point(2021, 2, 417.0),
            point(2020, 12, 414.0),
            point(2021, 1, 415.0),
            point(2020, 1, 410.0),
            point(2020, 6, 412.0),
        ];
        let shuffled = build_annual_averages(&points);
        let mut sorted_input = points.clone();
        sorted_input.sort_by_key(|p| p.date);
        assert_eq!(shuffled, build_annual_averages(&sorted_input));
        assert_eq!(shuffled.len(), 2);
        assert_eq!(shuffled[0].year, 2020);
    }

    #[test]
    fn test_single_sample_year() {
        let annual = build_annual_averages(&[point(1999, 3, 368.5)]);
        assert_eq!(annual, vec![AnnualAverage { year: 1999, value: 368.5 }]);
    }

    #[test]
    fn test_empty_series() {
        assert!(build_annual_averages(&[]).is_empty());
    }
}
