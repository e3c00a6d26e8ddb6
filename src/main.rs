use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rating_rs::cli::get_config;
use rating_rs::io::{SeriesLoader, WorkbookLoader};
use rating_rs::pipeline::{process, report, write_outputs};
use rating_rs::report::TracingReporter;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rating_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Configuration
    let config = get_config();
    info!("Base directory: {}", config.base_directory.display());

    // Load both workbooks
    let loader = WorkbookLoader::from_config(&config);
    let continuous = loader
        .load_continuous()
        .with_context(|| format!("Failed to load sensor data: {:?}", config.continuous_file))?;
    let reference = loader.load_reference().with_context(|| {
        format!(
            "Failed to load manual measurements: {:?}",
            config.reference_file
        )
    })?;

    info!(
        "Loaded {} sensor sites and {} gauged sites",
        continuous.len(),
        reference.len()
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sites {msg}",
            )?
            .progress_chars("#>-"),
    );

    let outputs = process(continuous, reference, &config, &pb)?;

    for site in &outputs.unmatched_reference {
        warn!("Manual measurements for {} were not used", site);
    }
    for failure in &outputs.failures {
        warn!("No rating curve for {}: {}", failure.site, failure.error);
    }

    write_outputs(&config, &outputs)?;
    report(&config, &outputs, &mut TracingReporter)?;

    info!(
        "Processing complete. Outputs saved to {}",
        config.output_directory.display()
    );
    Ok(())
}
