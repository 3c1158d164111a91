use serde::Serialize;

/// A fitted line `value = slope · year + intercept`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegressionModel {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl RegressionModel {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares over `(x, y)` pairs, closed form.
///
/// Never fails: no points gives the zero model, identical `x` values give a
/// zero slope, and a constant `y` gives an `r_squared` of zero.
pub fn run_linear_regression(points: &[(f64, f64)]) -> RegressionModel {
    let n = points.len() as f64;
    if points.is_empty() {
        return RegressionModel::default();
    }

    let (sum_x, sum_y, sum_xy, sum_xx) = points.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), &(x, y)| (sx + x, sy + y, sxy + x * y, sxx + x * x),
    );

    let denominator = n * sum_xx - sum_x * sum_x;
    let slope = if denominator == 0.0 {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denominator
    };
    let intercept = (sum_y - slope * sum_x) / n;

    let mean_y = sum_y / n;
    let (ss_tot, ss_res) = points.iter().fold((0.0, 0.0), |(tot, res), &(x, y)| {
        let fitted = slope * x + intercept;
        (tot + (y - mean_y).powi(2), res + (y - fitted).powi(2))
    });
    let r_squared = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    RegressionModel {
        slope,
        intercept,
        r_squared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let model = run_linear_regression(&[(2020.0, 10.0), (2021.0, 12.0), (2022.0, 14.0)]);
        assert!((model.slope - 2.0).abs() < 1e-6);
        assert!((model.intercept + 4030.0).abs() < 1e-6);
        assert!((model.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_gives_zero_model() {
        let model = run_linear_regression(&[]);
        assert_eq!(
            model,
            RegressionModel { slope: 0.0, intercept: 0.0, r_squared: 0.0 }
        );
    }

    #[test]
    fn test_identical_x() {
        let model = run_linear_regression(&[(2020.0, 1.0), (2020.0, 3.0)]);
        assert_eq!(model.slope, 0.0);
        assert_eq!(model.intercept, 2.0);
        // Residuals equal the total spread around the mean
        assert_eq!(model.r_squared, 0.0);
    }

    #[test]
    fn test_single_point() {
        let model = run_linear_regression(&[(2020.0, 5.0)]);
        assert_eq!(model.slope, 0.0);
        assert_eq!(model.intercept, 5.0);
        assert_eq!(model.r_squared, 0.0);
    }

    #[test]
    fn test_constant_y() {
        let model = run_linear_regression(&[(2000.0, 7.0), (2001.0, 7.0), (2002.0, 7.0)]);
        assert!(model.slope.abs() < 1e-12);
        assert_eq!(model.r_squared, 0.0);
    }

    #[test]
    fn test_noisy_fit() {
        let model = run_linear_regression(&[(0.0, 1.0), (1.0, 2.0), (2.0, 2.0), (3.0, 4.0)]);
        assert!((model.slope - 0.9).abs() < 1e-9);
        assert!((model.intercept - 0.9).abs() < 1e-9);
        assert!(model.r_squared > 0.8 && model.r_squared < 1.0);
        assert!((model.predict(4.0) - 4.5).abs() < 1e-9);
    }
}
