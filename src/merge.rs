use crate::align::align_reference;
use crate::registry::SiteRegistry;
use crate::series::{ColumnKey, ContinuousSeries, ReferenceSeries, Table, Timestamp};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

// Sensor depth paired with a manual flow measurement at the same instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPoint {
    pub timestamp: Timestamp,
    pub depth: f64,
    pub flow: f64,
}

// Rows available for fitting one site's rating curve
#[derive(Debug, Clone, PartialEq)]
pub struct FittingDataset {
    pub site: String,
    pub points: Vec<FitPoint>,
}

impl FittingDataset {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn depths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.depth).collect()
    }
}

/// Inner join of a sensor series with an aligned reference series.
///
/// Only timestamps carrying both a sensor depth and a manual flow survive.
pub fn fit_join(continuous: &ContinuousSeries, aligned: &ReferenceSeries) -> FittingDataset {
    let flows: HashMap<Timestamp, f64> = aligned
        .samples
        .iter()
        .map(|s| (s.timestamp, s.flow))
        .collect();

    let points = continuous
        .samples()
        .iter()
        .filter_map(|sample| {
            let depth = sample.depth.filter(|d| d.is_finite())?;
            let flow = *flows.get(&sample.timestamp)?;
            Some(FitPoint {
                timestamp: sample.timestamp,
                depth,
                flow,
            })
        })
        .collect();

    FittingDataset {
        site: continuous.site.clone(),
        points,
    }
}

/// Builds the fitting dataset of every site that has manual measurements
/// overlapping its sensor record. Sites without any are left out.
pub fn fitting_datasets(registry: &SiteRegistry) -> BTreeMap<String, FittingDataset> {
    let mut datasets = BTreeMap::new();
    for site in registry.sites.values() {
        let Some(reference) = &site.reference else {
            continue;
        };
        let dataset = fit_join(&site.continuous, &align_reference(reference));
        if dataset.is_empty() {
            debug!("{}: no manual measurements coincide with sensor data", site.id);
            continue;
        }
        debug!("{}: {} points available for fitting", site.id, dataset.len());
        datasets.insert(site.id.clone(), dataset);
    }
    datasets
}

/// Depth and temperature columns of one sensor series.
pub fn site_table(series: &ContinuousSeries) -> Table {
    let samples = series.samples();
    let mut table = Table::new(samples.iter().map(|s| s.timestamp).collect());
    table.insert_column(
        ColumnKey::depth(&series.site),
        samples.iter().map(|s| s.depth).collect(),
    );
    table.insert_column(
        ColumnKey::temperature(&series.site),
        samples.iter().map(|s| s.temperature).collect(),
    );
    table
}

/// Outer-joins every site's sensor record into one wide table.
///
/// Missing cells stay missing and rows empty across all columns are
/// dropped. With `trim_trailing_row` the final row is removed before that,
/// matching legacy outputs that always discarded it.
pub fn wide_merge(registry: &SiteRegistry, trim_trailing_row: bool) -> Table {
    let mut merged = registry
        .sites
        .values()
        .map(|site| site_table(&site.continuous))
        .fold(Table::default(), |acc, table| acc.outer_join(&table));

    if trim_trailing_row {
        merged = merged.without_last_row();
    }
    let merged = merged.drop_empty_rows();

    info!(
        "Merged {} sites into {} rows x {} columns",
        registry.len(),
        merged.len(),
        merged.columns().len()
    );
    merged
}
