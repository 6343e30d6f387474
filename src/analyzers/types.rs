//! Data types produced by the aggregation pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::utility::{mean, percentile};
use crate::routing::RoutingStatus;

/// Number of calls in each routing bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoutingCounts {
    pub routed: usize,
    pub not_routed: usize,
    pub hangup_before_route: usize,
    pub spam: usize,
    pub spam_likely: usize,
}

impl RoutingCounts {
    pub fn record(&mut self, status: RoutingStatus) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: RoutingStatus) -> usize {
        match status {
            RoutingStatus::Routed => self.routed,
            RoutingStatus::NotRouted => self.not_routed,
            RoutingStatus::HangupBeforeRoute => self.hangup_before_route,
            RoutingStatus::Spam => self.spam,
            RoutingStatus::SpamLikely => self.spam_likely,
        }
    }

    pub fn total(&self) -> usize {
        RoutingStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot(&mut self, status: RoutingStatus) -> &mut usize {
        match status {
            RoutingStatus::Routed => &mut self.routed,
            RoutingStatus::NotRouted => &mut self.not_routed,
            RoutingStatus::HangupBeforeRoute => &mut self.hangup_before_route,
            RoutingStatus::Spam => &mut self.spam,
            RoutingStatus::SpamLikely => &mut self.spam_likely,
        }
    }
}

/// Average, median and 90th percentile of call durations, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DurationStats {
    pub count: usize,
    pub avg: f64,
    pub median: f64,
    pub p90: f64,
}

impl DurationStats {
    pub fn from_durations(values: &[f64]) -> Self {
        Self {
            count: values.len(),
            avg: mean(values),
            median: percentile(values, 50.0),
            p90: percentile(values, 90.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub label: &'static str,
    pub lower_seconds: f64,
    /// `None` for the open-ended last bucket.
    pub upper_seconds: Option<f64>,
    pub count: usize,
}

/// Rates derived from a window's summed counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    /// Routed share of non-spam calls.
    pub routing_rate: f64,
    /// Share of attempted transfers the caller abandoned.
    pub transfer_failure_rate: f64,
    /// Spam and spam-likely share of all calls.
    pub spam_rate: f64,
}

/// Per-day counts inside a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCounts {
    pub date: NaiveDate,
    pub total_calls: usize,
    pub counts: RoutingCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowInfo {
    pub label: String,
    pub kind: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Metrics for one window. Always recomputed from call-level outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsAggregate {
    pub window: WindowInfo,
    /// Distinct calls in the window.
    pub total_calls: usize,
    pub counts: RoutingCounts,
    /// `counts.total() - total_calls`; anything but zero is a bug upstream.
    pub partition_discrepancy: i64,
    pub routed_durations: DurationStats,
    pub not_routed_durations: DurationStats,
    pub histogram: Vec<HistogramBucket>,
    pub transfer_reasons: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    /// Calls whose booking status is `booking-attempt`.
    pub booking_attempts: usize,
    /// Calls with a booking-intent category.
    pub eligible_leads: usize,
    pub rates: Rates,
    pub daily: Vec<DailyCounts>,
}

/// Every window computed for one report run.
#[derive(Debug, Clone, Serialize)]
pub struct RollupReport {
    pub schema_version: u8,
    pub client_id: String,
    pub generated_at: DateTime<Utc>,
    pub end_date: NaiveDate,
    /// Calls classified on the fly because the store had no entry.
    pub unclassified_calls: usize,
    pub windows: Vec<MetricsAggregate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_total_covers_every_bucket() {
        let mut counts = RoutingCounts::default();
        for status in RoutingStatus::ALL {
            counts.record(status);
        }
        counts.record(RoutingStatus::Spam);

        assert_eq!(counts.total(), 6);
        assert_eq!(counts.get(RoutingStatus::Spam), 2);
    }

    #[test]
    fn test_duration_stats_reference_values() {
        let stats = DurationStats::from_durations(&[5.0, 10.0, 15.0, 20.0, 100.0]);
        assert_eq!(stats.median, 15.0);
        assert_eq!(stats.p90, 100.0);
        assert_eq!(stats.avg, 30.0);

        assert_eq!(DurationStats::from_durations(&[]), DurationStats::default());
    }
}
