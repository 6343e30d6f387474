use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::analyzers::types::{
    DailyCounts, DurationStats, HistogramBucket, MetricsAggregate, Rates, RoutingCounts,
    WindowInfo,
};
use crate::analyzers::utility::ratio;
use crate::analyzers::window::Window;
use crate::call::CallRecord;
use crate::classify::taxonomy::{BookingStatus, Classification};
use crate::features::{EndedReason, Features};
use crate::routing::{self, RoutingStatus};

/// Duration histogram edges: `[lower, upper)`, the last bucket open-ended.
static HISTOGRAM_EDGES: &[(&str, f64, Option<f64>)] = &[
    ("0-15s", 0.0, Some(15.0)),
    ("15-30s", 15.0, Some(30.0)),
    ("30-60s", 30.0, Some(60.0)),
    ("60-120s", 60.0, Some(120.0)),
    ("120s+", 120.0, None),
];

/// Everything the aggregator needs to know about one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub call_id: String,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub ended_reason: EndedReason,
    pub classification: Classification,
    pub routing_status: RoutingStatus,
}

impl CallOutcome {
    pub fn resolve(call: &CallRecord, features: &Features, classification: Classification) -> Self {
        let routing_status = routing::resolve(call, features, &classification);
        Self {
            call_id: call.id.clone(),
            created_at: call.created_at,
            duration_seconds: features.duration_seconds,
            ended_reason: features.ended_reason,
            classification,
            routing_status,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// Aggregates the outcomes that fall inside `window`.
///
/// Rates are computed from the window's summed counts, never by averaging
/// per-day rates. A mismatch between distinct calls and bucket counts is
/// logged and reported in `partition_discrepancy`; no call is dropped.
pub fn aggregate_window(window: &Window, outcomes: &[CallOutcome]) -> MetricsAggregate {
    let (start, end) = window.bounds();
    let in_window: Vec<&CallOutcome> = outcomes
        .iter()
        .filter(|o| window.contains(o.day()))
        .collect();

    let mut counts = RoutingCounts::default();
    let mut ids = HashSet::new();
    let mut routed = Vec::new();
    let mut not_routed = Vec::new();
    let mut all_durations = Vec::with_capacity(in_window.len());
    let mut transfer_reasons: BTreeMap<String, usize> = BTreeMap::new();
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, (HashSet<&str>, RoutingCounts)> = BTreeMap::new();
    let mut eligible_leads = 0;
    let mut booking_attempts = 0;

    for o in &in_window {
        ids.insert(o.call_id.as_str());
        counts.record(o.routing_status);
        all_durations.push(o.duration_seconds);

        match o.routing_status {
            RoutingStatus::Routed => routed.push(o.duration_seconds),
            RoutingStatus::NotRouted => not_routed.push(o.duration_seconds),
            _ => {}
        }

        if let Some(reason) = o.classification.transfer_reason() {
            *transfer_reasons.entry(reason.to_string()).or_default() += 1;
        }
        let category = o.classification.category();
        *categories.entry(category.as_str().to_string()).or_default() += 1;
        if category.is_booking() {
            eligible_leads += 1;
        }
        if o.classification.booking_status() == BookingStatus::BookingAttempt {
            booking_attempts += 1;
        }

        let day = daily.entry(o.day()).or_default();
        day.0.insert(o.call_id.as_str());
        day.1.record(o.routing_status);
    }

    let total_calls = ids.len();
    let partition_discrepancy = counts.total() as i64 - total_calls as i64;
    if partition_discrepancy != 0 {
        warn!(
            window = %window,
            total_calls,
            bucketed = counts.total(),
            discrepancy = partition_discrepancy,
            "Routing status partition mismatch"
        );
    }

    MetricsAggregate {
        window: WindowInfo {
            label: window.to_string(),
            kind: window.kind(),
            start,
            end,
        },
        total_calls,
        counts,
        partition_discrepancy,
        routed_durations: DurationStats::from_durations(&routed),
        not_routed_durations: DurationStats::from_durations(&not_routed),
        histogram: histogram(&all_durations),
        transfer_reasons,
        categories,
        booking_attempts,
        eligible_leads,
        rates: rates(&counts, total_calls),
        daily: daily
            .into_iter()
            .map(|(date, (ids, counts))| DailyCounts {
                date,
                total_calls: ids.len(),
                counts,
            })
            .collect(),
    }
}

pub fn histogram(durations: &[f64]) -> Vec<HistogramBucket> {
    HISTOGRAM_EDGES
        .iter()
        .map(|&(label, lower, upper)| HistogramBucket {
            label,
            lower_seconds: lower,
            upper_seconds: upper,
            count: durations
                .iter()
                .filter(|d| **d >= lower && upper.is_none_or(|u| **d < u))
                .count(),
        })
        .collect()
}

pub fn rates(counts: &RoutingCounts, total_calls: usize) -> Rates {
    let non_spam = counts.routed + counts.not_routed + counts.hangup_before_route;
    Rates {
        routing_rate: ratio(counts.routed, non_spam),
        transfer_failure_rate: ratio(
            counts.hangup_before_route,
            counts.routed + counts.hangup_before_route,
        ),
        spam_rate: ratio(counts.spam + counts.spam_likely, total_calls),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn outcome(id: &str, day: u32, duration: f64, status: RoutingStatus) -> CallOutcome {
        CallOutcome {
            call_id: id.into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
            duration_seconds: duration,
            ended_reason: EndedReason::CustomerEndedCall,
            classification: Classification::Unknown,
            routing_status: status,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn test_histogram_edges_are_right_open() {
        let buckets = histogram(&[0.0, 14.9, 15.0, 30.0, 59.9, 60.0, 119.0, 120.0, 3600.0]);
        let counts: Vec<_> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 2, 2, 2]);
    }

    #[test]
    fn test_window_filters_by_day() {
        let outcomes = vec![
            outcome("a", 3, 20.0, RoutingStatus::Routed),
            outcome("b", 4, 20.0, RoutingStatus::NotRouted),
            outcome("c", 5, 20.0, RoutingStatus::Spam),
        ];
        let agg = aggregate_window(&Window::Day(d(4)), &outcomes);

        assert_eq!(agg.total_calls, 1);
        assert_eq!(agg.counts.not_routed, 1);
        assert_eq!(agg.window.label, "2025-03-04");
        assert_eq!(agg.partition_discrepancy, 0);
    }

    #[test]
    fn test_rates_use_window_counts_not_daily_average() {
        // Day 1: 1 of 1 routed. Day 2: 1 of 9 routed.
        let mut outcomes = vec![
            outcome("d1", 3, 60.0, RoutingStatus::Routed),
            outcome("d2-r", 4, 60.0, RoutingStatus::Routed),
        ];
        for i in 0..8 {
            outcomes.push(outcome(&format!("d2-{i}"), 4, 30.0, RoutingStatus::NotRouted));
        }
        let agg = aggregate_window(&Window::Range { start: d(3), end: d(4) }, &outcomes);

        assert_eq!(agg.total_calls, 10);
        assert_eq!(agg.rates.routing_rate, 0.2);
        assert_ne!(agg.rates.routing_rate, (1.0 + 1.0 / 9.0) / 2.0);
        assert_eq!(agg.daily.len(), 2);
        assert_eq!(agg.daily[1].total_calls, 9);
    }

    #[test]
    fn test_duration_split_by_routing() {
        let outcomes = vec![
            outcome("a", 3, 5.0, RoutingStatus::Routed),
            outcome("b", 3, 10.0, RoutingStatus::Routed),
            outcome("c", 3, 15.0, RoutingStatus::Routed),
            outcome("d", 3, 20.0, RoutingStatus::Routed),
            outcome("e", 3, 100.0, RoutingStatus::Routed),
            outcome("f", 3, 40.0, RoutingStatus::NotRouted),
            outcome("g", 3, 2.0, RoutingStatus::SpamLikely),
        ];
        let agg = aggregate_window(&Window::Day(d(3)), &outcomes);

        assert_eq!(agg.routed_durations.median, 15.0);
        assert_eq!(agg.routed_durations.p90, 100.0);
        assert_eq!(agg.not_routed_durations.avg, 40.0);
        assert_eq!(agg.rates.spam_rate, 1.0 / 7.0);
    }

    #[test]
    fn test_duplicate_call_is_reported_not_dropped() {
        let outcomes = vec![
            outcome("a", 3, 20.0, RoutingStatus::Routed),
            outcome("a", 3, 20.0, RoutingStatus::Spam),
        ];
        let agg = aggregate_window(&Window::Day(d(3)), &outcomes);

        assert_eq!(agg.total_calls, 1);
        assert_eq!(agg.counts.total(), 2);
        assert_eq!(agg.partition_discrepancy, 1);
    }

    #[test]
    fn test_empty_window() {
        let agg = aggregate_window(&Window::Day(d(3)), &[]);
        assert_eq!(agg.total_calls, 0);
        assert_eq!(agg.routed_durations, DurationStats::default());
        assert_eq!(agg.rates, Rates::default());
        assert!(agg.histogram.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_transfer_reasons_and_leads() {
        let mut a = outcome("a", 3, 60.0, RoutingStatus::Routed);
        a.classification = Classification::BookingTransferred {
            transfer_reason: Some("scheduling".into()),
        };
        let mut b = outcome("b", 3, 60.0, RoutingStatus::Routed);
        b.classification = Classification::Transferred {
            transfer_reason: Some("billing".into()),
        };
        let mut c = outcome("c", 3, 60.0, RoutingStatus::NotRouted);
        c.classification = Classification::BookingCompleted;

        let agg = aggregate_window(&Window::Day(d(3)), &[a, b, c]);
        assert_eq!(agg.transfer_reasons["scheduling"], 1);
        assert_eq!(agg.transfer_reasons["billing"], 1);
        assert_eq!(agg.eligible_leads, 2);
        assert_eq!(agg.booking_attempts, 2);
        assert_eq!(agg.categories["booking-completed"], 1);
    }
}
