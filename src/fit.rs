//! Rating curve fitting: ordinary least squares of a quadratic mapping sensor
//! depth to discharge, `flow = a*depth^2 + b*depth + c`.

use crate::merge::FittingDataset;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Distinct depths needed to pin down a quadratic.
pub const MIN_DISTINCT_DEPTHS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("{site}: no points to fit")]
    EmptyDataset { site: String },

    #[error("{site}: only {distinct} distinct depth values, need at least {MIN_DISTINCT_DEPTHS}")]
    Degenerate { site: String, distinct: usize },

    #[error("{site}: normal equations are singular")]
    Singular { site: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingCurve {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl RatingCurve {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        RatingCurve { a, b, c }
    }

    pub fn evaluate(&self, depth: f64) -> f64 {
        (self.a * depth + self.b) * depth + self.c
    }

    /// Mean squared residual over a dataset. Diagnostic only.
    pub fn mean_squared_residual(&self, dataset: &FittingDataset) -> f64 {
        if dataset.is_empty() {
            return 0.0;
        }
        let total: f64 = dataset
            .points
            .iter()
            .map(|p| (self.evaluate(p.depth) - p.flow).powi(2))
            .sum();
        total / dataset.len() as f64
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RatingCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flow = {:.6}*x^2 + {:.6}*x + {:.6}",
            self.a, self.b, self.c
        )
    }
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

// Gaussian elimination with partial pivoting; None when singular
fn solve3(mut m: [[f64; 3]; 3], mut rhs: [f64; 3]) -> Option<[f64; 3]> {
    let scale = m
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }

    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot][col].abs() <= scale * 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| m[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[row][row];
    }
    Some(x)
}

/// Fits a rating curve to one site's joined depth/flow points.
///
/// Depths are scaled to `[-1, 1]` before the normal equations are formed,
/// and the coefficients are mapped back afterwards.
pub fn fit_rating_curve(dataset: &FittingDataset) -> Result<RatingCurve, FitError> {
    let site = dataset.site.clone();
    if dataset.is_empty() {
        return Err(FitError::EmptyDataset { site });
    }

    let depths = dataset.depths();
    let distinct = distinct_count(&depths);
    if distinct < MIN_DISTINCT_DEPTHS {
        return Err(FitError::Degenerate { site, distinct });
    }

    let scale = depths.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));

    // s[k] = sum(u^k), t[k] = sum(u^k * y)
    let mut s = [0.0; 5];
    let mut t = [0.0; 3];
    for point in &dataset.points {
        let u = point.depth / scale;
        let mut pow = 1.0;
        for k in 0..5 {
            s[k] += pow;
            if k < 3 {
                t[k] += pow * point.flow;
            }
            pow *= u;
        }
    }

    // Unknowns ordered (c, b, a) in the scaled variable
    let normal = [[s[0], s[1], s[2]], [s[1], s[2], s[3]], [s[2], s[3], s[4]]];
    let [c, b_u, a_u] = solve3(normal, t).ok_or(FitError::Singular { site })?;

    Ok(RatingCurve {
        a: a_u / (scale * scale),
        b: b_u / scale,
        c,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::FitPoint;
    use chrono::NaiveDate;

    fn dataset(points: &[(f64, f64)]) -> FittingDataset {
        let t0 = NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        FittingDataset {
            site: "KAR".to_string(),
            points: points
                .iter()
                .enumerate()
                .map(|(i, &(depth, flow))| FitPoint {
                    timestamp: t0 + chrono::Duration::minutes(5 * i as i64),
                    depth,
                    flow,
                })
                .collect(),
        }
    }

    // Closed-form simple linear regression
    fn best_linear_msr(data: &FittingDataset) -> f64 {
        let n = data.len() as f64;
        let mx = data.points.iter().map(|p| p.depth).sum::<f64>() / n;
        let my = data.points.iter().map(|p| p.flow).sum::<f64>() / n;
        let sxy: f64 = data
            .points
            .iter()
            .map(|p| (p.depth - mx) * (p.flow - my))
            .sum();
        let sxx: f64 = data.points.iter().map(|p| (p.depth - mx).powi(2)).sum();
        let slope = sxy / sxx;
        let intercept = my - slope * mx;
        data.points
            .iter()
            .map(|p| (intercept + slope * p.depth - p.flow).powi(2))
            .sum::<f64>()
            / n
    }

    #[test]
    fn test_exact_quadratic_through_three_points() {
        let data = dataset(&[(10.0, 1.0), (15.0, 2.25), (20.0, 4.0)]);
        let curve = fit_rating_curve(&data).unwrap();
        assert!((curve.a - 0.01).abs() < 1e-10);
        assert!(curve.b.abs() < 1e-8);
        assert!(curve.c.abs() < 1e-7);
        assert!(curve.mean_squared_residual(&data) < 1e-16);
        assert!((curve.evaluate(20.0) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_least_squares_beats_linear_fit() {
        let data = dataset(&[
            (12.0, 0.31),
            (14.5, 0.42),
            (18.0, 0.71),
            (22.0, 1.02),
            (25.5, 1.55),
            (31.0, 2.40),
            (33.0, 2.61),
        ]);
        let curve = fit_rating_curve(&data).unwrap();
        assert!(curve.mean_squared_residual(&data) <= best_linear_msr(&data) + 1e-12);
    }

    #[test]
    fn test_residuals_are_minimal() {
        let data = dataset(&[(1.0, 2.0), (2.0, 2.9), (3.0, 6.1), (4.0, 10.8), (5.0, 18.2)]);
        let curve = fit_rating_curve(&data).unwrap();
        let best = curve.mean_squared_residual(&data);
        for (da, db, dc) in [(1e-3, 0.0, 0.0), (0.0, -1e-3, 0.0), (0.0, 0.0, 1e-3)] {
            let nudged = RatingCurve::new(curve.a + da, curve.b + db, curve.c + dc);
            assert!(nudged.mean_squared_residual(&data) > best);
        }
    }

    #[test]
    fn test_large_depths_stay_well_conditioned() {
        let points: Vec<(f64, f64)> = (0..20)
            .map(|i| {
                let d = 1_000.0 + 10.0 * i as f64;
                (d, 2e-4 * d * d - 0.3 * d + 7.0)
            })
            .collect();
        let curve = fit_rating_curve(&dataset(&points)).unwrap();
        assert!((curve.a - 2e-4).abs() < 1e-8);
        assert!((curve.b + 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_too_few_distinct_depths() {
        let err = fit_rating_curve(&dataset(&[(10.0, 1.0), (10.0, 1.2), (20.0, 4.0)])).unwrap_err();
        assert_eq!(
            err,
            FitError::Degenerate {
                site: "KAR".to_string(),
                distinct: 2
            }
        );
    }

    #[test]
    fn test_empty_dataset() {
        let err = fit_rating_curve(&dataset(&[])).unwrap_err();
        assert!(matches!(err, FitError::EmptyDataset { .. }));
    }

    #[test]
    fn test_evaluate_and_label() {
        let curve = RatingCurve::new(1.0, -5.0, 3.0);
        assert_eq!(curve.evaluate(0.0), 3.0);
        assert_eq!(curve.evaluate(1.0), -1.0);
        assert_eq!(
            curve.label(),
            "flow = 1.000000*x^2 + -5.000000*x + 3.000000"
        );
    }

    #[test]
    fn test_solve3_singular() {
        let m = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [1.0, 0.0, 1.0]];
        assert!(solve3(m, [1.0, 2.0, 3.0]).is_none());
        assert!(solve3([[0.0; 3]; 3], [0.0; 3]).is_none());
    }
}
