use std::path::{Path, PathBuf};

pub const DEFAULT_CONTINUOUS_FILE: &str = "OTT_Data_All_stations.xlsx";
pub const DEFAULT_REFERENCE_FILE: &str = "RatingCurves/Rating_Curve_Calculations.xlsx";
pub const RATING_CURVE_DIR: &str = "RatingCurves";

// Cell layout of the two input workbooks (zero-based rows and columns)
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookLayout {
    pub continuous_skip_rows: usize,
    pub reference_sheet: String,
    pub reference_header_row: usize,
    pub reference_first_data_row: usize,
    pub reference_first_group_column: usize,
    pub reference_group_width: usize,
    pub reference_date_offset: usize,
    pub reference_time_offset: usize,
    pub reference_flow_offset: usize,
}

impl WorkbookLayout {
    pub fn new() -> Self {
        WorkbookLayout {
            continuous_skip_rows: 2,
            reference_sheet: "Rating Curves".to_string(),
            reference_header_row: 0,
            reference_first_data_row: 2,
            reference_first_group_column: 1,
            reference_group_width: 4,
            reference_date_offset: 0,
            reference_time_offset: 1,
            reference_flow_offset: 3,
        }
    }

    /// (date, time, flow) columns of the `group`-th site in the reference sheet.
    pub fn reference_columns(&self, group: usize) -> (usize, usize, usize) {
        let start = self.reference_first_group_column + group * self.reference_group_width;
        (
            start + self.reference_date_offset,
            start + self.reference_time_offset,
            start + self.reference_flow_offset,
        )
    }
}

impl Default for WorkbookLayout {
    fn default() -> Self {
        Self::new()
    }
}

// Everything one run needs to know about where data lives
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_directory: PathBuf,
    pub continuous_file: PathBuf,
    pub reference_file: PathBuf,
    pub output_directory: PathBuf,
    pub rating_curve_directory: PathBuf,
    /// Drop the last merged row, as older outputs did.
    pub trim_trailing_row: bool,
    pub layout: WorkbookLayout,
}

impl PipelineConfig {
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        let base_directory = base_directory.into();
        PipelineConfig {
            continuous_file: base_directory.join(DEFAULT_CONTINUOUS_FILE),
            reference_file: base_directory.join(DEFAULT_REFERENCE_FILE),
            output_directory: base_directory.clone(),
            rating_curve_directory: base_directory.join(RATING_CURVE_DIR),
            base_directory,
            trim_trailing_row: false,
            layout: WorkbookLayout::new(),
        }
    }

    /// Relative paths resolve against the base directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_directory.join(path)
        }
    }

    pub fn table_path(&self, freq_label: &str) -> PathBuf {
        self.output_directory
            .join(format!("Stream_Discharge_All_{}.csv", freq_label))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_directory.join("Stream_Discharge_All_summary.csv")
    }

    pub fn curves_path(&self) -> PathBuf {
        self.output_directory.join("Rating_Curves.csv")
    }
}
