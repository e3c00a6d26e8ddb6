use crate::config::{DEFAULT_CONTINUOUS_FILE, DEFAULT_REFERENCE_FILE, PipelineConfig};
use clap::Parser;
use std::path::PathBuf;

/// Fit streamgauge rating curves and publish merged discharge tables
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Root directory for all inputs and outputs
    pub base_dir: PathBuf,

    /// Sensor workbook, one sheet per site
    #[arg(long, default_value = DEFAULT_CONTINUOUS_FILE)]
    pub continuous_file: PathBuf,

    /// Manual gauging workbook
    #[arg(long, default_value = DEFAULT_REFERENCE_FILE)]
    pub reference_file: PathBuf,

    /// Where CSV outputs are written (defaults to the base directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Drop the final merged row, as older outputs did
    #[arg(long)]
    pub trim_trailing_row: bool,
}

impl Args {
    pub fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.base_dir);
        config.continuous_file = config.resolve(&self.continuous_file);
        config.reference_file = config.resolve(&self.reference_file);
        if let Some(dir) = self.output_dir {
            config.output_directory = config.resolve(&dir);
        }
        config.trim_trailing_row = self.trim_trailing_row;
        config
    }
}

pub fn get_config() -> PipelineConfig {
    Args::parse().into_config()
}
