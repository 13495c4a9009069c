//! Append-only price track of one instrument.

use crate::types::Sample;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Time-ordered samples with strictly increasing timestamps.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    samples: Vec<Sample>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a freshly fetched batch.
    ///
    /// Only samples newer than the current last timestamp are appended, in
    /// arrival order; anything at or before it (duplicates, stale or
    /// out-of-order rows) is dropped. Returns the number appended.
    pub fn merge(&mut self, batch: &[Sample]) -> usize {
        if batch.is_empty() {
            debug!("Empty batch, keeping {} known samples", self.samples.len());
            return 0;
        }

        let mut appended = 0;
        for sample in batch {
            if self.last_timestamp().map_or(true, |last| sample.timestamp > last) {
                self.samples.push(*sample);
                appended += 1;
            }
        }

        appended
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Newest value.
    pub fn now_price(&self) -> Option<f64> {
        self.samples.last().map(|s| s.value)
    }

    /// Value just before the newest one.
    pub fn last_price(&self) -> Option<f64> {
        self.samples.len().checked_sub(2).map(|i| self.samples[i].value)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, value: f64) -> Sample {
        Sample::new(Utc.timestamp_opt(secs, 0).unwrap(), value)
    }

    #[test]
    fn test_merge_into_empty() {
        let mut series = PriceSeries::new();
        assert_eq!(series.merge(&[at(1, 10.0), at(2, 11.0)]), 2);
        assert_eq!(series.len(), 2);
        assert_eq!(series.now_price(), Some(11.0));
        assert_eq!(series.last_price(), Some(10.0));
    }

    #[test]
    fn test_merge_drops_overlap() {
        let mut series = PriceSeries::new();
        series.merge(&[at(1, 10.0), at(2, 11.0), at(3, 12.0)]);

        let appended = series.merge(&[at(2, 99.0), at(3, 99.0), at(4, 13.0), at(5, 14.0)]);
        assert_eq!(appended, 2);
        let values: Vec<f64> = series.samples().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![10.0, 11.0, 12.0, 13.0, 14.0]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = [at(10, 1.0), at(20, 2.0)];
        let mut series = PriceSeries::new();
        series.merge(&batch);
        assert_eq!(series.merge(&batch), 0);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_out_of_order_samples_are_dropped_not_reordered() {
        let mut series = PriceSeries::new();
        let appended = series.merge(&[at(5, 1.0), at(3, 2.0), at(7, 3.0), at(6, 4.0)]);
        assert_eq!(appended, 2);
        let stamps: Vec<i64> = series.samples().iter().map(|s| s.timestamp.timestamp()).collect();
        assert_eq!(stamps, vec![5, 7]);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut series = PriceSeries::new();
        series.merge(&[at(1, 1.0)]);
        assert_eq!(series.merge(&[]), 0);
        assert_eq!(series.len(), 1);
        assert_eq!(series.last_price(), None);
    }
}
