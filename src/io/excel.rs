use crate::config::{PipelineConfig, WorkbookLayout};
use crate::series::{ContinuousSample, ContinuousSeries, ReferenceSample, ReferenceSeries};
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open workbook {path}: {msg}")]
    WorkbookOpen { path: String, msg: String },

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("No site names in header row {0} of the manual measurement sheet")]
    MissingSiteHeader(usize),

    #[error("Invalid data in sheet {sheet} at row {row}, col {col}: {msg}")]
    InvalidData {
        sheet: String,
        row: u32,
        col: u32,
        msg: String,
    },
}

/// Source of the raw per-site series.
pub trait SeriesLoader {
    fn load_continuous(&self) -> Result<Vec<ContinuousSeries>, LoadError>;
    fn load_reference(&self) -> Result<Vec<ReferenceSeries>, LoadError>;
}

/// Reads the sensor and manual gauging workbooks (.xlsx).
pub struct WorkbookLoader {
    continuous_path: PathBuf,
    reference_path: PathBuf,
    layout: WorkbookLayout,
}

impl WorkbookLoader {
    pub fn new(
        continuous_path: impl Into<PathBuf>,
        reference_path: impl Into<PathBuf>,
        layout: WorkbookLayout,
    ) -> Self {
        Self {
            continuous_path: continuous_path.into(),
            reference_path: reference_path.into(),
            layout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            &config.continuous_file,
            &config.reference_file,
            config.layout.clone(),
        )
    }

    fn open(path: &Path) -> Result<Xlsx<BufReader<File>>, LoadError> {
        open_workbook(path).map_err(|e: calamine::XlsxError| LoadError::WorkbookOpen {
            path: path.display().to_string(),
            msg: e.to_string(),
        })
    }
}

impl SeriesLoader for WorkbookLoader {
    fn load_continuous(&self) -> Result<Vec<ContinuousSeries>, LoadError> {
        let mut workbook = Self::open(&self.continuous_path)?;
        let mut all_series = Vec::new();

        for site in workbook.sheet_names() {
            let range = match workbook.worksheet_range(&site) {
                Ok(range) => range,
                Err(e) => {
                    warn!("Skipping sensor sheet {}: {}", site, e);
                    continue;
                }
            };
            let series = parse_continuous_sheet(&site, &range, &self.layout);
            info!("Loaded {} sensor readings for {}", series.len(), site);
            all_series.push(series);
        }

        Ok(all_series)
    }

    fn load_reference(&self) -> Result<Vec<ReferenceSeries>, LoadError> {
        let mut workbook = Self::open(&self.reference_path)?;
        let sheet = &self.layout.reference_sheet;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|_| LoadError::SheetNotFound(sheet.clone()))?;

        let series = parse_reference_sheet(&range, &self.layout)?;
        info!(
            "Loaded manual measurements for {} sites from {}",
            series.len(),
            self.reference_path.display()
        );
        Ok(series)
    }
}

/// Parses one sensor sheet: timestamp, depth and temperature columns.
///
/// Rows whose first cell is not a timestamp (blank lines, footers) are
/// skipped. Unreadable depth or temperature cells become missing values.
pub fn parse_continuous_sheet(
    site: &str,
    range: &Range<Data>,
    layout: &WorkbookLayout,
) -> ContinuousSeries {
    let mut samples = Vec::new();
    let Some((last_row, _)) = range.end() else {
        return ContinuousSeries::new(site, samples);
    };

    for row in layout.continuous_skip_rows as u32..=last_row {
        let Some(timestamp) = cell_timestamp(range.get_value((row, 0))) else {
            debug!("{}: no timestamp at row {}, skipping", site, row);
            continue;
        };
        let number = |col: u32| match cell_number(range.get_value((row, col))) {
            Ok(value) => value,
            Err(msg) => {
                warn!("{}: row {}, col {}: {}, treated as missing", site, row, col, msg);
                None
            }
        };
        samples.push(ContinuousSample {
            timestamp,
            depth: number(1),
            temperature: number(2),
        });
    }

    ContinuousSeries::new(site, samples)
}

/// Parses the manual measurement sheet into one series per site header.
///
/// A site whose columns hold unreadable values is dropped with a warning so
/// the remaining sites still load.
pub fn parse_reference_sheet(
    range: &Range<Data>,
    layout: &WorkbookLayout,
) -> Result<Vec<ReferenceSeries>, LoadError> {
    let sites = site_headers(range, layout.reference_header_row as u32);
    if sites.is_empty() {
        return Err(LoadError::MissingSiteHeader(layout.reference_header_row));
    }

    let mut all_series = Vec::new();
    for (group, site) in sites.iter().enumerate() {
        match parse_reference_group(range, layout, site, group) {
            Ok(series) => {
                debug!("{}: {} manual measurements", site, series.samples.len());
                all_series.push(series);
            }
            Err(e) => warn!("Skipping manual measurements for {}: {}", site, e),
        }
    }
    Ok(all_series)
}

fn site_headers(range: &Range<Data>, row: u32) -> Vec<String> {
    let Some((_, last_col)) = range.end() else {
        return Vec::new();
    };
    (0..=last_col)
        .filter_map(|col| match range.get_value((row, col)) {
            Some(Data::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Data::Int(i)) => Some(i.to_string()),
            Some(Data::Float(f)) => Some(format!("{f}")),
            _ => None,
        })
        .collect()
}

fn parse_reference_group(
    range: &Range<Data>,
    layout: &WorkbookLayout,
    site: &str,
    group: usize,
) -> Result<ReferenceSeries, LoadError> {
    let (date_col, time_col, flow_col) = layout.reference_columns(group);
    let (date_col, time_col, flow_col) = (date_col as u32, time_col as u32, flow_col as u32);
    let mut samples = Vec::new();
    let Some((last_row, _)) = range.end() else {
        return Ok(ReferenceSeries::new(site, samples));
    };

    for row in layout.reference_first_data_row as u32..=last_row {
        let date = cell_date(range.get_value((row, date_col)));
        let time = cell_time(range.get_value((row, time_col)));
        let flow = cell_number(range.get_value((row, flow_col))).map_err(|msg| {
            LoadError::InvalidData {
                sheet: layout.reference_sheet.clone(),
                row,
                col: flow_col,
                msg,
            }
        })?;

        if let (Some(date), Some(time), Some(flow)) = (date, time, flow) {
            samples.push(ReferenceSample {
                timestamp: date.and_time(time),
                flow,
            });
        }
    }

    Ok(ReferenceSeries::new(site, samples))
}

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const TIME_FORMATS: [&str; 3] = ["%H:%M:%S", "%H:%M", "%H%M"];

// Excel serial day numbers count from 1899-12-30
fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    base.checked_add_signed(Duration::seconds(seconds))
}

// Sensor clocks are read to the second; drops float noise from serials
fn round_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    let nanos = i64::from(ts.nanosecond());
    let truncated = ts - Duration::nanoseconds(nanos);
    if nanos >= 500_000_000 {
        truncated + Duration::seconds(1)
    } else {
        truncated
    }
}

fn cell_timestamp(cell: Option<&Data>) -> Option<NaiveDateTime> {
    match cell? {
        Data::DateTime(dt) => dt.as_datetime().map(round_to_second),
        Data::Float(f) => from_excel_serial(*f),
        Data::Int(i) => from_excel_serial(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => {
            let s = s.trim();
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        }
        _ => None,
    }
}

fn cell_date(cell: Option<&Data>) -> Option<NaiveDate> {
    match cell? {
        Data::String(s) | Data::DateTimeIso(s) => {
            let s = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .or_else(|| cell_timestamp(cell).map(|ts| ts.date()))
        }
        _ => cell_timestamp(cell).map(|ts| ts.date()),
    }
}

fn cell_time(cell: Option<&Data>) -> Option<NaiveTime> {
    match cell? {
        Data::DateTime(dt) => dt.as_datetime().map(|ts| round_to_second(ts).time()),
        Data::Float(f) if (0.0..1.0).contains(f) => from_excel_serial(*f).map(|ts| ts.time()),
        Data::String(s) => {
            let s = s.trim();
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        }
        _ => None,
    }
}

fn cell_number(cell: Option<&Data>) -> Result<Option<f64>, String> {
    match cell {
        None | Some(Data::Empty) | Some(Data::Error(_)) => Ok(None),
        Some(Data::Float(f)) => Ok(Some(*f).filter(|f| f.is_finite())),
        Some(Data::Int(i)) => Ok(Some(*i as f64)),
        Some(Data::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed == "-"
                || trimmed.eq_ignore_ascii_case("n/a")
                || trimmed.eq_ignore_ascii_case("nan")
            {
                Ok(None)
            } else {
                trimmed
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| format!("Cannot parse number: {s}"))
            }
        }
        Some(other) => Err(format!("Expected number, got: {other:?}")),
    }
}
