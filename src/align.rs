use crate::series::{ReferenceSample, ReferenceSeries, Timestamp};
use chrono::{Duration, Timelike};
use std::collections::BTreeMap;

// Fixed-width resampling frequencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Hourly,
    FiveMinute,
}

impl Frequency {
    /// Output order of the resampled tables.
    pub const ALL: [Frequency; 3] = [Frequency::Daily, Frequency::Hourly, Frequency::FiveMinute];

    pub fn seconds(&self) -> i64 {
        match self {
            Frequency::Daily => 86_400,
            Frequency::Hourly => 3_600,
            Frequency::FiveMinute => 300,
        }
    }

    /// Tag used in output file names.
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Daily => "D",
            Frequency::Hourly => "H",
            Frequency::FiveMinute => "5min",
        }
    }

    /// Start of the bucket containing `ts`. Buckets are closed on the left.
    pub fn floor(&self, ts: &Timestamp) -> Timestamp {
        let secs = ts.and_utc().timestamp();
        let offset = secs.rem_euclid(self.seconds());
        *ts - Duration::seconds(offset) - Duration::nanoseconds(i64::from(ts.nanosecond()))
    }
}

/// Puts manually entered measurements on the 5-minute grid.
///
/// Each bucket holds the mean of the samples that fall in it. Non-finite
/// flows are discarded and buckets without a sample are never emitted, so
/// gaps stay gaps.
pub fn align_reference(series: &ReferenceSeries) -> ReferenceSeries {
    let mut buckets: BTreeMap<Timestamp, (f64, usize)> = BTreeMap::new();
    for sample in series.samples.iter().filter(|s| s.flow.is_finite()) {
        let bucket = buckets
            .entry(Frequency::FiveMinute.floor(&sample.timestamp))
            .or_insert((0.0, 0));
        bucket.0 += sample.flow;
        bucket.1 += 1;
    }

    let samples = buckets
        .into_iter()
        .map(|(timestamp, (sum, count))| ReferenceSample {
            timestamp,
            flow: sum / count as f64,
        })
        .collect();

    ReferenceSeries::new(series.site.clone(), samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2014, 11, 3)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn sample(timestamp: Timestamp, flow: f64) -> ReferenceSample {
        ReferenceSample { timestamp, flow }
    }

    #[test]
    fn test_floor_frequencies() {
        let t = ts(13, 47, 12);
        assert_eq!(Frequency::FiveMinute.floor(&t), ts(13, 45, 0));
        assert_eq!(Frequency::Hourly.floor(&t), ts(13, 0, 0));
        assert_eq!(Frequency::Daily.floor(&t), ts(0, 0, 0));
        assert_eq!(Frequency::FiveMinute.floor(&ts(13, 45, 0)), ts(13, 45, 0));
    }

    #[test]
    fn test_floor_before_epoch() {
        let t = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_opt(23, 58, 0)
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_opt(23, 55, 0)
            .unwrap();
        assert_eq!(Frequency::FiveMinute.floor(&t), expected);
    }

    #[test]
    fn test_align_means_within_bucket() {
        let series = ReferenceSeries::new(
            "KAR",
            vec![
                sample(ts(10, 2, 0), 1.0),
                sample(ts(10, 4, 59), 3.0),
                sample(ts(10, 5, 0), 5.0),
            ],
        );
        let aligned = align_reference(&series);
        assert_eq!(
            aligned.samples,
            vec![sample(ts(10, 0, 0), 2.0), sample(ts(10, 5, 0), 5.0)]
        );
    }

    #[test]
    fn test_align_output_on_grid_and_strictly_ascending() {
        let series = ReferenceSeries::new(
            "KAR",
            vec![
                sample(ts(16, 31, 0), 0.4),
                sample(ts(9, 12, 30), 0.2),
                sample(ts(12, 59, 59), f64::NAN),
                sample(ts(9, 14, 0), 0.3),
                sample(ts(23, 59, 0), 0.1),
            ],
        );
        let aligned = align_reference(&series);
        assert_eq!(aligned.samples.len(), 3);
        assert!(
            aligned
                .samples
                .iter()
                .all(|s| Frequency::FiveMinute.floor(&s.timestamp) == s.timestamp)
        );
        assert!(
            aligned
                .samples
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
        );
        assert!((aligned.samples[0].flow - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_align_empty_series() {
        let aligned = align_reference(&ReferenceSeries::new("KAR", Vec::new()));
        assert!(aligned.is_empty());
        assert_eq!(aligned.site, "KAR");
    }
}
