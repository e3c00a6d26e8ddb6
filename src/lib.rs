pub mod aggregate;
pub mod align;
pub mod cli;
pub mod config;
pub mod derive;
pub mod fit;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod series;
