// Input workbooks and output files

pub mod csv;
pub mod excel;
pub mod results;

pub use excel::{LoadError, SeriesLoader, WorkbookLoader};
