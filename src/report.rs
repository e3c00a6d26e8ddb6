//! Plot inputs for the rendering side.
//!
//! Rendering itself lives outside this crate; a `Reporter` receives fully
//! prepared descriptors and decides how to draw them.

use crate::fit::RatingCurve;
use crate::merge::FittingDataset;
use crate::series::{Metric, Table};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Upper y-limit of the overview plot that hides flood peaks.
pub const WITHOUT_HIGHS_LIMIT: f64 = 50.0;

/// Keeps only the derived flow columns of a table.
pub fn select_flow_columns(table: &Table) -> Table {
    table.select(|key| key.metric == Metric::Flow)
}

// Scatter of joined points with the fitted curve drawn over it
#[derive(Debug, Clone, PartialEq)]
pub struct RatingCurvePlot {
    pub site: String,
    pub points: Vec<(f64, f64)>,
    pub curve: Vec<(f64, f64)>,
    pub x_limits: (f64, f64),
    pub y_min: f64,
    pub x_label: String,
    pub y_label: String,
    pub title: String,
    pub path: PathBuf,
}

impl RatingCurvePlot {
    pub fn new(dataset: &FittingDataset, curve: &RatingCurve, dir: &Path) -> Self {
        let site = dataset.site.clone();
        let points: Vec<(f64, f64)> = dataset.points.iter().map(|p| (p.depth, p.flow)).collect();

        let (min_depth, max_depth) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(d, _)| {
                (lo.min(d), hi.max(d))
            });

        // Integer depths from zero to just past the deepest gauging
        let upper = if max_depth.is_finite() {
            max_depth.max(0.0).floor() as i64 + 5
        } else {
            0
        };
        let curve_points = (0..upper)
            .map(|x| (x as f64, curve.evaluate(x as f64)))
            .collect();

        RatingCurvePlot {
            points,
            curve: curve_points,
            x_limits: (min_depth - 5.0, max_depth + 5.0),
            y_min: 0.0,
            x_label: format!("{} Depth [cm]", site),
            y_label: format!("{} Flow [m^3/s]", site),
            title: format!("{} Rating Curve : {}", site, curve),
            path: dir.join(format!("Rating_Curve_{}.jpg", site)),
            site,
        }
    }
}

// Hourly estimated flow of every fitted site on one time axis
#[derive(Debug, Clone, PartialEq)]
pub struct DischargePlot {
    pub flows: Table,
    pub legend: Vec<String>,
    pub y_limits: Option<(f64, f64)>,
    pub y_label: String,
    pub path: PathBuf,
}

impl DischargePlot {
    fn new(hourly: &Table, y_limits: Option<(f64, f64)>, path: PathBuf) -> Self {
        let flows = select_flow_columns(hourly);
        let legend = flows.keys().map(|k| k.site.clone()).collect();
        DischargePlot {
            flows,
            legend,
            y_limits,
            y_label: "Calculated Discharge [m^3/s]".to_string(),
            path,
        }
    }

    pub fn all(hourly: &Table, dir: &Path) -> Self {
        Self::new(hourly, None, dir.join("Stream_discharge_all.jpg"))
    }

    pub fn without_highs(hourly: &Table, dir: &Path) -> Self {
        Self::new(
            hourly,
            Some((0.0, WITHOUT_HIGHS_LIMIT)),
            dir.join("Stream_discharge_without_highs.jpg"),
        )
    }
}

/// Receives plot descriptors once the tables are final.
pub trait Reporter {
    fn rating_curve(&mut self, plot: &RatingCurvePlot) -> Result<()>;
    fn discharge(&mut self, plot: &DischargePlot) -> Result<()>;
}

/// Logs what would be drawn.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn rating_curve(&mut self, plot: &RatingCurvePlot) -> Result<()> {
        info!(
            "{} ({} points) -> {}",
            plot.title,
            plot.points.len(),
            plot.path.display()
        );
        Ok(())
    }

    fn discharge(&mut self, plot: &DischargePlot) -> Result<()> {
        info!(
            "Discharge plot of {} sites over {} hours -> {}",
            plot.legend.len(),
            plot.flows.len(),
            plot.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::FitPoint;
    use crate::series::ColumnKey;
    use chrono::NaiveDate;

    fn t(h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn hourly() -> Table {
        let mut table = Table::new(vec![t(0), t(1)]);
        table.insert_column(ColumnKey::depth("KAR"), vec![Some(10.0), Some(11.0)]);
        table.insert_column(ColumnKey::flow("KAR"), vec![Some(1.0), Some(1.2)]);
        table.insert_column(ColumnKey::temperature("MOS"), vec![Some(19.0), None]);
        table.insert_column(ColumnKey::flow("MOS"), vec![None, Some(60.0)]);
        table
    }

    #[test]
    fn test_select_flow_columns() {
        let flows = select_flow_columns(&hourly());
        let keys: Vec<&ColumnKey> = flows.keys().collect();
        assert_eq!(keys, vec![&ColumnKey::flow("KAR"), &ColumnKey::flow("MOS")]);
        assert_eq!(flows.len(), 2);
    }

    #[test]
    fn test_discharge_plots() {
        let dir = Path::new("/out");
        let all = DischargePlot::all(&hourly(), dir);
        assert_eq!(all.legend, vec!["KAR", "MOS"]);
        assert_eq!(all.y_limits, None);
        assert_eq!(all.path, PathBuf::from("/out/Stream_discharge_all.jpg"));

        let capped = DischargePlot::without_highs(&hourly(), dir);
        assert_eq!(capped.y_limits, Some((0.0, 50.0)));
    }

    #[test]
    fn test_rating_curve_plot() {
        let dataset = FittingDataset {
            site: "KAR".to_string(),
            points: [(10.0, 1.0), (12.5, 1.6), (20.0, 4.0)]
                .iter()
                .enumerate()
                .map(|(i, &(depth, flow))| FitPoint {
                    timestamp: t(i as u32),
                    depth,
                    flow,
                })
                .collect(),
        };
        let curve = RatingCurve::new(0.01, 0.0, 0.0);
        let plot = RatingCurvePlot::new(&dataset, &curve, Path::new("/out/RatingCurves"));

        assert_eq!(plot.points.len(), 3);
        assert_eq!(plot.x_limits, (5.0, 25.0));
        assert_eq!(plot.curve.len(), 25);
        assert_eq!(plot.curve[20].0, 20.0);
        assert!((plot.curve[20].1 - 4.0).abs() < 1e-12);
        assert!(plot.title.starts_with("KAR Rating Curve : flow = 0.010000*x^2"));
        assert_eq!(
            plot.path,
            PathBuf::from("/out/RatingCurves/Rating_Curve_KAR.jpg")
        );
    }
}
