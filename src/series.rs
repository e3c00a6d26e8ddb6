use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::warn;

pub type Timestamp = NaiveDateTime;

// One logger reading from a site's sensor
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSample {
    pub timestamp: Timestamp,
    pub depth: Option<f64>,
    pub temperature: Option<f64>,
}

// Full sensor history for one site, ascending with unique timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSeries {
    pub site: String,
    samples: Vec<ContinuousSample>,
}

impl ContinuousSeries {
    pub fn new(site: impl Into<String>, mut samples: Vec<ContinuousSample>) -> Self {
        let site = site.into();
        samples.sort_by_key(|s| s.timestamp);

        let before = samples.len();
        samples.dedup_by_key(|s| s.timestamp);
        if samples.len() != before {
            warn!(
                "{}: dropped {} samples with duplicated timestamps",
                site,
                before - samples.len()
            );
        }

        ContinuousSeries { site, samples }
    }

    pub fn samples(&self) -> &[ContinuousSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// One manual discharge measurement
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSample {
    pub timestamp: Timestamp,
    pub flow: f64,
}

// Manual gauging record for one site. Raw samples keep the order they were
// entered in; `align::align_reference` puts them on the 5-minute grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSeries {
    pub site: String,
    pub samples: Vec<ReferenceSample>,
}

impl ReferenceSeries {
    pub fn new(site: impl Into<String>, samples: Vec<ReferenceSample>) -> Self {
        ReferenceSeries {
            site: site.into(),
            samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What a table column measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Depth,
    Temperature,
    Flow,
}

impl Metric {
    /// Suffix used when the column is written out, e.g. `KAR_temp`.
    pub fn suffix(&self) -> &'static str {
        match self {
            Metric::Depth => "depth",
            Metric::Temperature => "temp",
            Metric::Flow => "flow",
        }
    }
}

/// Identifies a column by the site it belongs to and what it measures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub site: String,
    pub metric: Metric,
}

impl ColumnKey {
    pub fn new(site: impl Into<String>, metric: Metric) -> Self {
        ColumnKey {
            site: site.into(),
            metric,
        }
    }

    pub fn depth(site: &str) -> Self {
        ColumnKey::new(site, Metric::Depth)
    }

    pub fn temperature(site: &str) -> Self {
        ColumnKey::new(site, Metric::Temperature)
    }

    pub fn flow(site: &str) -> Self {
        ColumnKey::new(site, Metric::Flow)
    }

    pub fn name(&self) -> String {
        format!("{}_{}", self.site, self.metric.suffix())
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.site, self.metric.suffix())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: ColumnKey,
    pub values: Vec<Option<f64>>,
}

/// Wide, timestamp-indexed table of optional values.
///
/// The index is strictly ascending. Every column holds exactly one cell per
/// index entry; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index: Vec<Timestamp>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(index: Vec<Timestamp>) -> Self {
        debug_assert!(index.windows(2).all(|w| w[0] < w[1]));
        Table {
            index,
            columns: Vec::new(),
        }
    }

    /// Appends a column, replacing any existing column with the same key.
    pub fn insert_column(&mut self, key: ColumnKey, values: Vec<Option<f64>>) {
        assert_eq!(
            values.len(),
            self.index.len(),
            "column {} does not match the table index",
            key
        );
        match self.columns.iter_mut().find(|c| c.key == key) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { key, values }),
        }
    }

    pub fn index(&self) -> &[Timestamp] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| &c.key == key)
            .map(|c| c.values.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &ColumnKey> {
        self.columns.iter().map(|c| &c.key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn row(&self, i: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|c| c.values[i]).collect()
    }

    fn row_is_empty(&self, i: usize) -> bool {
        self.columns.iter().all(|c| c.values[i].is_none())
    }

    fn take_rows(&self, keep: &[usize]) -> Table {
        Table {
            index: keep.iter().map(|&i| self.index[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    key: c.key.clone(),
                    values: keep.iter().map(|&i| c.values[i]).collect(),
                })
                .collect(),
        }
    }

    /// Removes rows where every cell is missing.
    pub fn drop_empty_rows(&self) -> Table {
        let keep: Vec<usize> = (0..self.len()).filter(|&i| !self.row_is_empty(i)).collect();
        self.take_rows(&keep)
    }

    pub fn without_last_row(&self) -> Table {
        let keep: Vec<usize> = (0..self.len().saturating_sub(1)).collect();
        self.take_rows(&keep)
    }

    /// Columns ordered by their written name.
    pub fn sort_columns(&self) -> Table {
        let mut columns = self.columns.clone();
        columns.sort_by_cached_key(|c| c.key.name());
        Table {
            index: self.index.clone(),
            columns,
        }
    }

    pub fn select(&self, mut keep: impl FnMut(&ColumnKey) -> bool) -> Table {
        Table {
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| keep(&c.key))
                .cloned()
                .collect(),
        }
    }

    /// Full outer join on the timestamp index.
    ///
    /// Columns present on both sides keep the left value and fall back to
    /// the right one where the left is missing, so joining a table with
    /// itself returns the same table.
    pub fn outer_join(&self, other: &Table) -> Table {
        let index: Vec<Timestamp> = self
            .index
            .iter()
            .chain(other.index.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position: HashMap<Timestamp, usize> =
            index.iter().enumerate().map(|(i, ts)| (*ts, i)).collect();

        let mut joined = Table::new(index);
        for side in [self, other] {
            for column in &side.columns {
                let mut values = joined
                    .column(&column.key)
                    .map(<[Option<f64>]>::to_vec)
                    .unwrap_or_else(|| vec![None; joined.len()]);
                for (ts, value) in side.index.iter().zip(&column.values) {
                    let slot = &mut values[position[ts]];
                    if slot.is_none() {
                        *slot = *value;
                    }
                }
                joined.insert_column(column.key.clone(), values);
            }
        }
        joined
    }
}
