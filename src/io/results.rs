use crate::fit::RatingCurve;
use crate::merge::FittingDataset;
use serde::Serialize;

// One row of Rating_Curves.csv
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingCurveRecord {
    pub site: String,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub points: usize,
    pub mean_squared_residual: f64,
    pub label: String,
}

impl RatingCurveRecord {
    pub fn new(curve: &RatingCurve, dataset: &FittingDataset) -> Self {
        RatingCurveRecord {
            site: dataset.site.clone(),
            a: curve.a,
            b: curve.b,
            c: curve.c,
            points: dataset.len(),
            mean_squared_residual: curve.mean_squared_residual(dataset),
            label: curve.label(),
        }
    }
}
