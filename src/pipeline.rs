use crate::aggregate::{Aggregated, aggregate};
use crate::align::Frequency;
use crate::config::PipelineConfig;
use crate::derive::derive_flows;
use crate::fit::{FitError, RatingCurve, fit_rating_curve};
use crate::io::csv::{write_rating_curves, write_summary, write_table};
use crate::io::results::RatingCurveRecord;
use crate::merge::{FittingDataset, fitting_datasets, wide_merge};
use crate::registry::SiteRegistry;
use crate::report::{DischargePlot, RatingCurvePlot, Reporter};
use crate::series::{ContinuousSeries, ReferenceSeries, Table};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use tracing::{info, warn};

// A site whose curve could not be fitted; the batch carries on without it
#[derive(Debug, Clone, PartialEq)]
pub struct SiteFailure {
    pub site: String,
    pub error: FitError,
}

#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub curves: BTreeMap<String, RatingCurve>,
    pub fitting: BTreeMap<String, FittingDataset>,
    pub merged: Table,
    pub aggregated: Aggregated,
    pub failures: Vec<SiteFailure>,
    pub unmatched_reference: Vec<String>,
    pub duplicate_reference: Vec<String>,
    pub sites_without_reference: Vec<String>,
}

impl PipelineOutputs {
    pub fn rating_curve_records(&self) -> Vec<RatingCurveRecord> {
        self.curves
            .iter()
            .filter_map(|(site, curve)| {
                self.fitting
                    .get(site)
                    .map(|dataset| RatingCurveRecord::new(curve, dataset))
            })
            .collect()
    }
}

/// Runs every stage from raw series to the published tables.
///
/// Only a sensor site loaded twice aborts the run. A site whose fit fails is
/// reported in `failures` and keeps its depth and temperature columns
/// without a flow column.
pub fn process(
    continuous: Vec<ContinuousSeries>,
    reference: Vec<ReferenceSeries>,
    config: &PipelineConfig,
    pb: &ProgressBar,
) -> Result<PipelineOutputs> {
    let registry =
        SiteRegistry::build(continuous, reference).context("Failed to build site registry")?;
    if registry.is_empty() {
        warn!("No sensor sites loaded, outputs will be empty");
    }
    let sites_without_reference = registry.sites_without_reference();
    for site in &sites_without_reference {
        info!("{}: no manual measurements, flow will not be estimated", site);
    }

    let fitting = fitting_datasets(&registry);
    let merged = wide_merge(&registry, config.trim_trailing_row);

    pb.set_length(fitting.len() as u64);
    let mut curves = BTreeMap::new();
    let mut failures = Vec::new();
    for (site, dataset) in &fitting {
        pb.set_message(site.clone());
        match fit_rating_curve(dataset) {
            Ok(curve) => {
                info!("{}: {} ({} points)", site, curve, dataset.len());
                curves.insert(site.clone(), curve);
            }
            Err(error) => {
                warn!("{}", error);
                failures.push(SiteFailure {
                    site: site.clone(),
                    error,
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let with_flow = derive_flows(&merged, &curves);
    let aggregated = aggregate(&with_flow);

    info!(
        "Fitted {} of {} sites, {} failed",
        curves.len(),
        registry.len(),
        failures.len()
    );

    Ok(PipelineOutputs {
        curves,
        fitting,
        merged: with_flow,
        aggregated,
        failures,
        unmatched_reference: registry.unmatched_reference,
        duplicate_reference: registry.duplicate_reference,
        sites_without_reference,
    })
}

/// Writes the three resampled tables, the summary and the fitted coefficients.
pub fn write_outputs(config: &PipelineConfig, outputs: &PipelineOutputs) -> Result<()> {
    for freq in Frequency::ALL {
        let path = config.table_path(freq.label());
        write_table(&path, outputs.aggregated.at(freq))
            .with_context(|| format!("Failed to write {} table", freq.label()))?;
    }
    write_summary(&config.summary_path(), &outputs.aggregated.summary)
        .context("Failed to write summary table")?;
    write_rating_curves(&config.curves_path(), &outputs.rating_curve_records())
        .context("Failed to write rating curves")?;
    Ok(())
}

/// Hands one plot per fitted site plus the two discharge overviews to `reporter`.
pub fn report(
    config: &PipelineConfig,
    outputs: &PipelineOutputs,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    for (site, curve) in &outputs.curves {
        let Some(dataset) = outputs.fitting.get(site) else {
            continue;
        };
        reporter.rating_curve(&RatingCurvePlot::new(
            dataset,
            curve,
            &config.rating_curve_directory,
        ))?;
    }

    let hourly = &outputs.aggregated.hourly;
    reporter.discharge(&DischargePlot::all(hourly, &config.output_directory))?;
    reporter.discharge(&DischargePlot::without_highs(
        hourly,
        &config.output_directory,
    ))?;
    Ok(())
}
