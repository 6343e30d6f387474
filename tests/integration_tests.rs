use call_outcome_rater::analyzers::aggregate::{CallOutcome, aggregate_window};
use call_outcome_rater::analyzers::analyzer::build_report;
use call_outcome_rater::analyzers::window::Window;
use call_outcome_rater::classify::classify_offline;
use call_outcome_rater::classify::taxonomy::{Category, Classification};
use call_outcome_rater::features::{ExtractorConfig, Features};
use call_outcome_rater::parser::parse_calls;
use call_outcome_rater::routing::RoutingStatus;
use call_outcome_rater::store::{CallStore, ClassificationStore, EnrichmentEntry, group_by_day};
use chrono::NaiveDate;
use std::collections::HashMap;

fn sample_outcomes() -> HashMap<String, CallOutcome> {
    let bytes = include_bytes!("fixtures/sample_calls.json");
    let calls = parse_calls(bytes).expect("Failed to parse calls");
    let extractor = ExtractorConfig::default();

    calls
        .iter()
        .map(|call| {
            let features = Features::from_call(call, &extractor);
            let classification = classify_offline(call, &features);
            (
                call.id.clone(),
                CallOutcome::resolve(call, &features, classification),
            )
        })
        .collect()
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

#[test]
fn test_malformed_record_is_skipped() {
    let outcomes = sample_outcomes();
    assert_eq!(outcomes.len(), 8);
}

#[test]
fn test_booking_then_hangup_is_a_booking() {
    let o = &sample_outcomes()["booked-then-hangup"];
    assert_eq!(o.classification, Classification::BookingCompleted);
    assert_eq!(o.routing_status, RoutingStatus::NotRouted);
}

#[test]
fn test_failed_transfer() {
    let o = &sample_outcomes()["failed-transfer"];
    assert_eq!(o.classification.category(), Category::Hangup);
    assert!(
        o.classification
            .note()
            .unwrap()
            .contains("hung-up-during-transfer-to-sales")
    );
    assert_eq!(o.classification.transfer_reason(), None);
    assert_eq!(o.routing_status, RoutingStatus::HangupBeforeRoute);
}

#[test]
fn test_short_silent_call_is_spam_likely() {
    let o = &sample_outcomes()["short-silent"];
    assert_eq!(o.classification.category(), Category::Spam);
    assert_eq!(o.routing_status, RoutingStatus::SpamLikely);
}

#[test]
fn test_remaining_fixture_calls() {
    let outcomes = sample_outcomes();

    let fwd = &outcomes["forwarded-billing"];
    assert_eq!(fwd.duration_seconds, 120.0);
    assert_eq!(fwd.classification.transfer_reason(), Some("billing"));
    assert_eq!(fwd.routing_status, RoutingStatus::Routed);

    assert_eq!(
        outcomes["plain-hangup"].classification.note(),
        Some("customer-hung-up")
    );
    // No fallback applies to assistant-ended calls.
    assert_eq!(
        outcomes["assistant-ended"].classification,
        Classification::Unknown
    );
    assert_eq!(
        outcomes["booking-phrase"].classification,
        Classification::BookingCompleted
    );

    let silence = &outcomes["silence-short"];
    assert_eq!(silence.classification.spam_type(), Some("short-call"));
    assert_eq!(silence.routing_status, RoutingStatus::Spam);
}

#[test]
fn test_day_and_range_aggregates() {
    let outcomes: Vec<CallOutcome> = sample_outcomes().into_values().collect();

    let day = aggregate_window(&Window::Day(d(4)), &outcomes);
    assert_eq!(day.total_calls, 6);
    assert_eq!(day.counts.routed, 1);
    assert_eq!(day.counts.hangup_before_route, 1);
    assert_eq!(day.counts.spam_likely, 1);
    assert_eq!(day.counts.not_routed, 3);
    assert_eq!(day.partition_discrepancy, 0);
    assert_eq!(day.rates.routing_rate, 0.2);
    assert_eq!(day.rates.transfer_failure_rate, 0.5);
    assert_eq!(day.transfer_reasons["billing"], 1);

    let range = aggregate_window(&Window::Range { start: d(4), end: d(5) }, &outcomes);
    assert_eq!(range.total_calls, 8);
    assert_eq!(range.counts.total(), 8);
    assert_eq!(range.counts.not_routed, 4);
    assert_eq!(range.rates.spam_rate, 0.25);
    assert_eq!(range.eligible_leads, 2);
    assert_eq!(range.daily.len(), 2);
}

#[test]
fn test_report_prefers_stored_classifications() {
    let dir = tempfile::tempdir().unwrap();
    let calls = CallStore::new(dir.path());
    let store = ClassificationStore::new(dir.path());

    let parsed = parse_calls(include_bytes!("fixtures/sample_calls.json")).unwrap();
    for (date, day_calls) in group_by_day(parsed.clone()) {
        calls.merge_day(date, day_calls).unwrap();
    }

    // The model decided the assistant-ended call was an abandoned booking.
    let call = parsed.iter().find(|c| c.id == "assistant-ended").unwrap();
    store
        .merge_day(
            d(4),
            [EnrichmentEntry::new(
                call,
                &Classification::BookingAbandoned,
                "gpt-4o-mini",
            )],
        )
        .unwrap();

    let (report, outcomes) = build_report(
        &calls,
        &store,
        &ExtractorConfig::default(),
        "smile-dental",
        d(5),
        &Window::standard(d(5)),
    )
    .unwrap();

    assert_eq!(report.client_id, "smile-dental");
    assert_eq!(report.unclassified_calls, 7);
    assert_eq!(outcomes.len(), 8);
    assert_eq!(report.windows.len(), 5);

    let labels: Vec<_> = report.windows.iter().map(|w| w.window.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["2025-03-05", "2025-W10", "rolling-7d", "rolling-30d", "rolling-3m"]
    );

    let seven_day = &report.windows[2];
    assert_eq!(seven_day.total_calls, 8);
    assert_eq!(seven_day.categories["booking-abandoned"], 1);
    assert_eq!(seven_day.eligible_leads, 3);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["windows"][0]["total_calls"], 2);
}

#[test]
fn test_unbounded_rolling_window_reads_only_stored_days() {
    let dir = tempfile::tempdir().unwrap();
    let calls = CallStore::new(dir.path());
    let store = ClassificationStore::new(dir.path());
    let parsed = parse_calls(include_bytes!("fixtures/sample_calls.json")).unwrap();
    for (date, day_calls) in group_by_day(parsed) {
        calls.merge_day(date, day_calls).unwrap();
    }

    let windows = vec![
        Window::parse("days:100000000", d(5)).unwrap(),
        Window::parse("months:100000000", d(5)).unwrap(),
    ];
    assert_eq!(windows[0].bounds().0, NaiveDate::MIN);

    let (report, outcomes) = build_report(
        &calls,
        &store,
        &ExtractorConfig::default(),
        "smile-dental",
        d(5),
        &windows,
    )
    .unwrap();

    assert_eq!(outcomes.len(), 8);
    assert!(report.windows.iter().all(|w| w.total_calls == 8));
}
