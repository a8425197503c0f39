//! Metrics Aggregator
//!
//! Rolling in-process store keyed by `(service, metric)`. Each series keeps
//! time buckets of count/sum/min/max that are only ever evicted by age, so
//! summaries and counts cover the whole retention window at any load. A
//! capped tail of raw samples backs the raw query endpoint.
//!
//! Each series sits behind its own map shard, so writers for different
//! series never contend and readers only hold one shard at a time.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use compass_core::{MetricSample, MetricSummary};
use dashmap::DashMap;

use super::settings::SettingsHandle;
use crate::constants::{MAX_RAW_SAMPLES_PER_SERIES, SUMMARY_BUCKETS_PER_WINDOW};

type SeriesKey = (String, String);

/// Aggregate of the samples whose timestamps fall in
/// `[start, start + width_secs)`.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    width_secs: i64,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Bucket {
    fn new(width_secs: i64) -> Self {
        Self {
            width_secs,
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn merge(&mut self, other: &Bucket) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    fn live(&self, start: i64, cutoff_secs: i64) -> bool {
        start + self.width_secs > cutoff_secs
    }

    fn summary(&self) -> Option<MetricSummary> {
        (self.count > 0).then(|| MetricSummary {
            count: self.count,
            avg_value: self.sum / self.count as f64,
            min_value: self.min,
            max_value: self.max,
        })
    }
}

#[derive(Debug, Default)]
struct Series {
    /// Keyed by bucket start, unix seconds.
    buckets: BTreeMap<i64, Bucket>,
    recent: VecDeque<MetricSample>,
}

impl Series {
    fn push(&mut self, sample: MetricSample, width_secs: i64) {
        let ts = sample.timestamp.timestamp();
        let start = ts.div_euclid(width_secs) * width_secs;
        self.buckets
            .entry(start)
            .or_insert_with(|| Bucket::new(width_secs))
            .add(sample.value);

        self.recent.push_back(sample);
        if self.recent.len() > MAX_RAW_SAMPLES_PER_SERIES {
            self.recent.pop_front();
        }
    }

    /// Drop buckets and raw samples older than `cutoff`. Returns the number
    /// of samples the dropped buckets held.
    fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let cutoff_secs = cutoff.timestamp();
        let mut dropped = 0;
        while let Some(entry) = self.buckets.first_entry() {
            if entry.get().live(*entry.key(), cutoff_secs) {
                break;
            }
            dropped += entry.remove().count as usize;
        }
        while self.recent.front().is_some_and(|s| s.timestamp < cutoff) {
            self.recent.pop_front();
        }
        dropped
    }

    fn summary(&self, cutoff: DateTime<Utc>) -> Option<MetricSummary> {
        let cutoff_secs = cutoff.timestamp();
        let mut total = Bucket::new(0);
        for (start, bucket) in &self.buckets {
            if bucket.live(*start, cutoff_secs) {
                total.merge(bucket);
            }
        }
        total.summary()
    }

    fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.recent.is_empty()
    }
}

#[derive(Debug)]
pub struct MetricsAggregator {
    series: DashMap<SeriesKey, Series>,
    settings: SettingsHandle,
}

impl MetricsAggregator {
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            series: DashMap::new(),
            settings,
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.settings.current().retention()
    }

    /// Append a sample. Dropped when monitoring is disabled.
    pub fn record(&self, sample: MetricSample) -> bool {
        let settings = self.settings.current();
        if !settings.monitoring_enabled {
            return false;
        }
        let retention = settings.retention();
        let width_secs = (retention.num_seconds() / SUMMARY_BUCKETS_PER_WINDOW).max(1);
        let cutoff = Utc::now() - retention;
        let key = (sample.service.clone(), sample.metric_name.clone());
        let mut series = self.series.entry(key).or_default();
        series.prune(cutoff);
        series.push(sample, width_secs);
        true
    }

    /// Summary of one series over the retention window.
    pub fn summarize(&self, service: &str, metric: &str) -> Option<MetricSummary> {
        let cutoff = self.cutoff();
        let key = (service.to_string(), metric.to_string());
        self.series.get(&key)?.summary(cutoff)
    }

    /// Every non-empty series, grouped by service.
    pub fn summarize_all(&self) -> BTreeMap<String, BTreeMap<String, MetricSummary>> {
        let cutoff = self.cutoff();
        let mut out: BTreeMap<String, BTreeMap<String, MetricSummary>> = BTreeMap::new();
        for entry in self.series.iter() {
            let (service, metric) = entry.key();
            if let Some(summary) = entry.value().summary(cutoff) {
                out.entry(service.clone())
                    .or_default()
                    .insert(metric.clone(), summary);
            }
        }
        out
    }

    /// Number of samples recorded in one series within the retention window.
    pub fn count(&self, service: &str, metric: &str) -> u64 {
        self.summarize(service, metric).map_or(0, |s| s.count)
    }

    /// Raw samples newer than `since`, oldest first. Only the most recent
    /// `MAX_RAW_SAMPLES_PER_SERIES` of each series are available.
    pub fn query(
        &self,
        service: Option<&str>,
        metric: Option<&str>,
        since: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        let since = since.max(self.cutoff());
        let mut samples: Vec<MetricSample> = self
            .series
            .iter()
            .filter(|entry| {
                let (s, m) = entry.key();
                service.map_or(true, |want| s == want) && metric.map_or(true, |want| m == want)
            })
            .flat_map(|entry| {
                entry
                    .value()
                    .recent
                    .iter()
                    .filter(|s| s.timestamp >= since)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        samples
    }

    /// Drop expired samples and empty series. Returns the number of samples dropped.
    pub fn evict_expired(&self) -> usize {
        let cutoff = self.cutoff();
        let mut dropped = 0;
        self.series.retain(|_, series| {
            dropped += series.prune(cutoff);
            !series.is_empty()
        });
        dropped
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::settings::MonitorSettingsPatch;
    use compass_core::metric_names;

    fn aggregator() -> MetricsAggregator {
        MetricsAggregator::new(SettingsHandle::default())
    }

    #[test]
    fn test_summary_over_window() -> Result<(), String> {
        let agg = aggregator();
        for v in [10.0, 20.0, 60.0] {
            agg.record(MetricSample::new("text", metric_names::LATENCY_MS, v));
        }
        let summary = agg
            .summarize("text", metric_names::LATENCY_MS)
            .ok_or("missing summary")?;
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min_value, 10.0);
        assert_eq!(summary.max_value, 60.0);
        assert!((summary.avg_value - 30.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_expired_samples_are_ignored_and_evicted() {
        let agg = aggregator();
        let old = Utc::now() - chrono::Duration::hours(2);
        agg.record(MetricSample::new("vision", metric_names::ATTEMPT_REAL, 1.0).at(old));
        agg.record(MetricSample::new("vision", metric_names::REAL_FAILURE, 1.0).at(old));
        agg.record(MetricSample::new("vision", metric_names::ATTEMPT_REAL, 1.0));

        assert_eq!(agg.count("vision", metric_names::ATTEMPT_REAL), 1);
        assert!(agg.summarize("vision", metric_names::REAL_FAILURE).is_none());
        // The stale attempt was already dropped by the later write to its series
        assert_eq!(agg.evict_expired(), 1);
        assert_eq!(agg.series_count(), 1);
    }

    #[test]
    fn test_disabled_monitoring_drops_samples() -> Result<(), String> {
        let settings = SettingsHandle::default();
        let agg = MetricsAggregator::new(settings.clone());
        settings
            .update(&MonitorSettingsPatch {
                monitoring_enabled: Some(false),
                ..Default::default()
            })
            .map_err(|e| e.to_string())?;
        assert!(!agg.record(MetricSample::new("text", metric_names::LATENCY_MS, 1.0)));
        assert!(agg.summarize_all().is_empty());
        Ok(())
    }

    #[test]
    fn test_counts_exceed_raw_sample_cap() {
        let agg = aggregator();
        let total = MAX_RAW_SAMPLES_PER_SERIES + 2_000;
        for i in 0..total {
            agg.record(MetricSample::new("text", metric_names::ATTEMPT_REAL, 1.0));
            if i % 2 == 0 {
                agg.record(MetricSample::new("text", metric_names::REAL_FAILURE, 1.0));
            }
        }

        let attempts = agg.count("text", metric_names::ATTEMPT_REAL);
        let failures = agg.count("text", metric_names::REAL_FAILURE);
        assert_eq!(attempts, total as u64);
        assert_eq!(failures, (total / 2) as u64);
        assert!((failures as f64 * 100.0 / attempts as f64 - 50.0).abs() < 1e-9);

        let raw = agg.query(Some("text"), Some(metric_names::ATTEMPT_REAL), Utc::now() - chrono::Duration::hours(1));
        assert_eq!(raw.len(), MAX_RAW_SAMPLES_PER_SERIES);
    }

    #[test]
    fn test_bucketed_summary_keeps_min_max_and_avg() -> Result<(), String> {
        let agg = aggregator();
        let now = Utc::now();
        for (offset, v) in [(0, 5.0), (10, 1.0), (600, 9.0), (1200, 5.0)] {
            agg.record(
                MetricSample::new("vision", metric_names::LATENCY_MS, v)
                    .at(now - chrono::Duration::seconds(offset)),
            );
        }
        let summary = agg
            .summarize("vision", metric_names::LATENCY_MS)
            .ok_or("missing summary")?;
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min_value, 1.0);
        assert_eq!(summary.max_value, 9.0);
        assert!((summary.avg_value - 5.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_query_filters_and_orders() {
        let agg = aggregator();
        let now = Utc::now();
        agg.record(MetricSample::new("text", metric_names::LATENCY_MS, 2.0).at(now));
        agg.record(
            MetricSample::new("text", metric_names::LATENCY_MS, 1.0)
                .at(now - chrono::Duration::minutes(5)),
        );
        agg.record(MetricSample::new("vision", metric_names::LATENCY_MS, 3.0).at(now));

        let text = agg.query(Some("text"), None, now - chrono::Duration::minutes(10));
        assert_eq!(text.iter().map(|s| s.value).collect::<Vec<_>>(), vec![1.0, 2.0]);

        let latency = agg.query(None, Some(metric_names::LATENCY_MS), now - chrono::Duration::minutes(1));
        assert_eq!(latency.len(), 2);
    }

    #[test]
    fn test_concurrent_writers() {
        let agg = aggregator();
        std::thread::scope(|s| {
            for t in 0..8 {
                let agg = &agg;
                s.spawn(move || {
                    let service = if t % 2 == 0 { "text" } else { "vision" };
                    for _ in 0..100 {
                        agg.record(MetricSample::new(service, metric_names::ATTEMPT_REAL, 1.0));
                    }
                });
            }
        });
        assert_eq!(agg.count("text", metric_names::ATTEMPT_REAL), 400);
        assert_eq!(agg.count("vision", metric_names::ATTEMPT_REAL), 400);
        let all = agg.summarize_all();
        assert_eq!(all.len(), 2);
    }
}
