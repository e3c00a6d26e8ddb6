use crate::aggregate::SummaryTable;
use crate::io::results::RatingCurveRecord;
use crate::series::{ColumnKey, Table};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Timestamp layout of the published tables, e.g. `2015-03-01 1405`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H%M";
pub const INDEX_LABEL: &str = "date_time";

fn create_csv_writer(path: &Path, has_headers: bool) -> Result<Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    WriterBuilder::new()
        .has_headers(has_headers)
        .from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn header<'a>(first: &str, keys: impl Iterator<Item = &'a ColumnKey>) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain(keys.map(ColumnKey::name))
        .collect()
}

/// Writes a timestamp-indexed table; missing cells are left blank.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut wtr = create_csv_writer(path, false)?;
    wtr.write_record(header(INDEX_LABEL, table.keys()))?;

    for (i, ts) in table.index().iter().enumerate() {
        let record = std::iter::once(ts.format(TIMESTAMP_FORMAT).to_string())
            .chain(table.row(i).into_iter().map(cell));
        wtr.write_record(record)?;
    }

    wtr.flush()
        .with_context(|| format!("Failed to flush CSV writer: {:?}", path))?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Writes the summary with one row per statistic and one column per series.
pub fn write_summary(path: &Path, summary: &SummaryTable) -> Result<()> {
    let mut wtr = create_csv_writer(path, false)?;
    wtr.write_record(header("", summary.columns.iter().map(|(k, _)| k)))?;

    for (statistic, values) in summary.rows() {
        let record = std::iter::once(statistic.to_string()).chain(values.into_iter().map(cell));
        wtr.write_record(record)?;
    }

    wtr.flush()
        .with_context(|| format!("Failed to flush CSV writer: {:?}", path))?;
    info!("Wrote summary statistics to {}", path.display());
    Ok(())
}

/// Writes fitted coefficients, one row per site.
pub fn write_rating_curves(path: &Path, records: &[RatingCurveRecord]) -> Result<()> {
    let mut wtr = create_csv_writer(path, true)?;
    for record in records {
        wtr.serialize(record)?;
    }

    wtr.flush()
        .with_context(|| format!("Failed to flush CSV writer: {:?}", path))?;
    info!("Wrote {} rating curves to {}", records.len(), path.display());
    Ok(())
}
