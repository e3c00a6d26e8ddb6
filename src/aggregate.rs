use crate::align::Frequency;
use crate::series::{ColumnKey, Table, Timestamp};
use tracing::info;

/// Deciles reported by the summary, as fractions.
pub const SUMMARY_PERCENTILES: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Mean-resamples a table onto `freq` buckets.
///
/// Buckets are labelled by their start. Buckets with no value in any column
/// are not emitted.
pub fn resample(table: &Table, freq: Frequency) -> Table {
    let mut buckets: Vec<(Timestamp, Vec<usize>)> = Vec::new();
    for (row, ts) in table.index().iter().enumerate() {
        let bucket = freq.floor(ts);
        match buckets.last_mut() {
            Some((start, rows)) if *start == bucket => rows.push(row),
            _ => buckets.push((bucket, vec![row])),
        }
    }

    let mut resampled = Table::new(buckets.iter().map(|(start, _)| *start).collect());
    for column in table.columns() {
        let means = buckets
            .iter()
            .map(|(_, rows)| mean(rows.iter().filter_map(|&r| column.values[r])))
            .collect();
        resampled.insert_column(column.key.clone(), means);
    }
    resampled.drop_empty_rows()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

// Descriptive statistics of one column, missing values excluded
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub percentiles: [Option<f64>; 9],
    pub max: Option<f64>,
}

impl ColumnSummary {
    pub fn compute(values: &[Option<f64>]) -> Self {
        let mut vals: Vec<f64> = values.iter().flatten().copied().collect();
        vals.sort_by(f64::total_cmp);

        let count = vals.len();
        let mean = mean(vals.iter().copied());
        let std = match (mean, count) {
            (Some(m), n) if n > 1 => {
                let ss: f64 = vals.iter().map(|v| (v - m).powi(2)).sum();
                Some((ss / (n - 1) as f64).sqrt())
            }
            _ => None,
        };

        ColumnSummary {
            count,
            mean,
            std,
            min: vals.first().copied(),
            percentiles: SUMMARY_PERCENTILES.map(|p| percentile(&vals, p)),
            max: vals.last().copied(),
        }
    }

    /// Values in `SummaryTable::STATISTICS` order.
    pub fn values(&self) -> Vec<Option<f64>> {
        let mut out = vec![Some(self.count as f64), self.mean, self.std, self.min];
        out.extend(self.percentiles);
        out.push(self.max);
        out
    }
}

// Linear interpolation between closest ranks of sorted data
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = p * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub columns: Vec<(ColumnKey, ColumnSummary)>,
}

impl SummaryTable {
    pub const STATISTICS: [&'static str; 14] = [
        "count", "mean", "std", "min", "10%", "20%", "30%", "40%", "50%", "60%", "70%", "80%",
        "90%", "max",
    ];

    pub fn compute(table: &Table) -> Self {
        SummaryTable {
            columns: table
                .columns()
                .iter()
                .map(|c| (c.key.clone(), ColumnSummary::compute(&c.values)))
                .collect(),
        }
    }

    pub fn get(&self, key: &ColumnKey) -> Option<&ColumnSummary> {
        self.columns.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    /// One `(statistic, values per column)` pair per output row.
    pub fn rows(&self) -> Vec<(&'static str, Vec<Option<f64>>)> {
        let per_column: Vec<Vec<Option<f64>>> =
            self.columns.iter().map(|(_, s)| s.values()).collect();
        Self::STATISTICS
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, per_column.iter().map(|v| v[i]).collect()))
            .collect()
    }
}

// Every table the pipeline publishes
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    pub daily: Table,
    pub hourly: Table,
    pub five_minute: Table,
    pub summary: SummaryTable,
}

impl Aggregated {
    pub fn at(&self, freq: Frequency) -> &Table {
        match freq {
            Frequency::Daily => &self.daily,
            Frequency::Hourly => &self.hourly,
            Frequency::FiveMinute => &self.five_minute,
        }
    }
}

/// Sorts columns, drops empty rows, resamples to every output frequency and
/// summarises the hourly table. An empty input yields empty outputs.
pub fn aggregate(merged: &Table) -> Aggregated {
    let prepared = merged.sort_columns().drop_empty_rows();

    let daily = resample(&prepared, Frequency::Daily);
    let hourly = resample(&prepared, Frequency::Hourly);
    let five_minute = resample(&prepared, Frequency::FiveMinute);
    let summary = SummaryTable::compute(&hourly);

    info!(
        "Resampled {} rows to {} daily, {} hourly, {} 5-minute rows",
        prepared.len(),
        daily.len(),
        hourly.len(),
        five_minute.len()
    );

    Aggregated {
        daily,
        hourly,
        five_minute,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    // Complete 5-minute grid over `days` days
    fn five_minute_grid(days: i64) -> Table {
        let n = days * 288;
        let index: Vec<Timestamp> = (0..n).map(|i| t0() + Duration::minutes(5 * i)).collect();
        let mut table = Table::new(index);
        table.insert_column(
            ColumnKey::depth("A"),
            (0..n).map(|i| Some((i as f64 * 0.37).sin() * 10.0 + 20.0)).collect(),
        );
        table.insert_column(
            ColumnKey::flow("A"),
            (0..n).map(|i| Some(i as f64 * 0.01)).collect(),
        );
        table
    }

    fn close(a: Option<f64>, b: Option<f64>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => (a - b).abs() < 1e-9,
            (None, None) => true,
            _ => false,
        }
    }

    #[test]
    fn test_resample_means_and_labels_bucket_start() {
        let index = vec![
            t0() + Duration::minutes(10),
            t0() + Duration::minutes(50),
            t0() + Duration::minutes(65),
        ];
        let mut table = Table::new(index);
        table.insert_column(ColumnKey::depth("A"), vec![Some(1.0), Some(3.0), None]);
        table.insert_column(ColumnKey::depth("B"), vec![None, Some(6.0), Some(8.0)]);

        let hourly = resample(&table, Frequency::Hourly);
        assert_eq!(hourly.index(), &[t0(), t0() + Duration::hours(1)]);
        assert_eq!(hourly.column(&ColumnKey::depth("A")), Some(&[Some(2.0), None][..]));
        assert_eq!(hourly.column(&ColumnKey::depth("B")), Some(&[Some(6.0), Some(8.0)][..]));
    }

    #[test]
    fn test_resample_drops_buckets_without_values() {
        let index = vec![t0(), t0() + Duration::hours(5)];
        let mut table = Table::new(index);
        table.insert_column(ColumnKey::depth("A"), vec![Some(1.0), None]);
        let hourly = resample(&table, Frequency::Hourly);
        assert_eq!(hourly.index(), &[t0()]);
    }

    #[test]
    fn test_hourly_then_daily_matches_daily() {
        let five = five_minute_grid(3);
        let direct = resample(&five, Frequency::Daily);
        let staged = resample(&resample(&five, Frequency::Hourly), Frequency::Daily);

        assert_eq!(direct.index(), staged.index());
        for column in direct.columns() {
            let other = staged.column(&column.key).unwrap();
            assert!(column.values.iter().zip(other).all(|(a, b)| close(*a, *b)));
        }
    }

    #[test]
    fn test_percentiles_interpolate() {
        let values: Vec<Option<f64>> = (1..=10).map(|v| Some(v as f64)).chain([None]).collect();
        let summary = ColumnSummary::compute(&values);
        assert_eq!(summary.count, 10);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(10.0));
        assert!(close(summary.mean, Some(5.5)));
        assert!(close(summary.percentiles[0], Some(1.9)));
        assert!(close(summary.percentiles[4], Some(5.5)));
        assert!(close(summary.percentiles[8], Some(9.1)));
        // sample standard deviation of 1..=10
        assert!(close(summary.std, Some(3.0276503540974917)));
    }

    #[test]
    fn test_summary_of_sparse_columns() {
        let single = ColumnSummary::compute(&[Some(4.0), None]);
        assert_eq!(single.count, 1);
        assert_eq!(single.std, None);
        assert_eq!(single.percentiles, [Some(4.0); 9]);

        let empty = ColumnSummary::compute(&[None, None]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.values()[0], Some(0.0));
        assert!(empty.values()[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_summary_rows_layout() {
        let five = five_minute_grid(1);
        let summary = SummaryTable::compute(&five);
        let rows = summary.rows();
        assert_eq!(rows.len(), 14);
        assert_eq!(rows[0].0, "count");
        assert_eq!(rows[0].1, vec![Some(288.0), Some(288.0)]);
        assert_eq!(rows[13].0, "max");
        assert!(summary.get(&ColumnKey::flow("A")).is_some());
    }

    #[test]
    fn test_aggregate_sorts_columns_and_uses_hourly_summary() {
        let five = five_minute_grid(2);
        let aggregated = aggregate(&five);

        let names: Vec<String> = aggregated.hourly.keys().map(ColumnKey::name).collect();
        assert_eq!(names, vec!["A_depth", "A_flow"]);
        assert_eq!(aggregated.daily.len(), 2);
        assert_eq!(aggregated.hourly.len(), 48);
        assert_eq!(aggregated.five_minute.len(), 576);
        assert_eq!(aggregated.at(Frequency::Hourly), &aggregated.hourly);
        assert_eq!(
            aggregated.summary.get(&ColumnKey::depth("A")).unwrap().count,
            48
        );
    }

    #[test]
    fn test_aggregate_empty_table() {
        let aggregated = aggregate(&Table::default());
        assert!(aggregated.daily.is_empty());
        assert!(aggregated.hourly.is_empty());
        assert!(aggregated.five_minute.is_empty());
        assert!(aggregated.summary.columns.is_empty());
        assert!(aggregated.summary.rows().iter().all(|(_, v)| v.is_empty()));
    }
}
