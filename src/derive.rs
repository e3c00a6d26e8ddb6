use crate::fit::RatingCurve;
use crate::series::{ColumnKey, Table};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Converts a depth column to estimated flow.
///
/// Missing or non-finite depths give a missing flow; negative estimates are
/// clamped to zero.
pub fn estimate_flow(curve: &RatingCurve, depths: &[Option<f64>]) -> Vec<Option<f64>> {
    depths
        .iter()
        .map(|depth| {
            let flow = curve.evaluate(depth.filter(|d| d.is_finite())?);
            if flow.is_nan() {
                None
            } else if flow < 0.0 {
                Some(0.0)
            } else {
                Some(flow)
            }
        })
        .collect()
}

/// Returns a copy of `merged` with a flow column for each fitted site.
pub fn derive_flows(merged: &Table, curves: &BTreeMap<String, RatingCurve>) -> Table {
    let mut derived = merged.clone();

    for (site, curve) in curves {
        let Some(depths) = merged.column(&ColumnKey::depth(site)) else {
            warn!("{}: fitted curve has no depth column to apply to", site);
            continue;
        };

        let flows = estimate_flow(curve, depths);
        let clamped = depths
            .iter()
            .flatten()
            .filter(|&&d| curve.evaluate(d) < 0.0)
            .count();
        if clamped > 0 {
            debug!("{}: clamped {} negative flow estimates to zero", site, clamped);
        }

        derived.insert_column(ColumnKey::flow(site), flows);
    }

    derived
}
