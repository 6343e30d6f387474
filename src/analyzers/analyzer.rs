use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::analyzers::aggregate::{CallOutcome, aggregate_window};
use crate::analyzers::types::RollupReport;
use crate::analyzers::window::Window;
use crate::classify::classify_offline;
use crate::features::{ExtractorConfig, Features};
use crate::store::{CallStore, ClassificationStore};

pub const REPORT_SCHEMA_VERSION: u8 = 1;

/// Outcomes for every stored call between `from` and `to`.
pub struct OutcomeSet {
    pub outcomes: Vec<CallOutcome>,
    /// Calls with no stored classification, classified by rules on the fly.
    pub unclassified: usize,
}

/// Joins stored calls with their stored classifications and resolves each
/// call's routing status. Calls without an entry go through the rule table
/// and overrides; nothing is persisted.
///
/// Only days with a stored call file are read, so an open-ended window costs
/// no more than the data on disk.
pub fn load_outcomes(
    calls: &CallStore,
    store: &ClassificationStore,
    extractor: &ExtractorConfig,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<OutcomeSet> {
    let mut outcomes = Vec::new();
    let mut unclassified = 0;

    let stored_days = calls.available_days()?;
    for day in stored_days.into_iter().filter(|d| (from..=to).contains(d)) {
        let day_calls = calls.load_day(day)?;
        if day_calls.is_empty() {
            continue;
        }
        let entries = store.load_day(day)?;

        for call in &day_calls {
            let features = Features::from_call(call, extractor);
            let classification = match entries.get(&call.id) {
                Some(entry) => entry.classification(),
                None => {
                    unclassified += 1;
                    classify_offline(call, &features)
                }
            };
            outcomes.push(CallOutcome::resolve(call, &features, classification));
        }
        debug!(date = %day, calls = day_calls.len(), "Outcomes loaded");
    }

    Ok(OutcomeSet {
        outcomes,
        unclassified,
    })
}

/// Loads outcomes covering every window once and aggregates each window.
#[tracing::instrument(skip(calls, store, extractor, windows), fields(windows = windows.len()))]
pub fn build_report(
    calls: &CallStore,
    store: &ClassificationStore,
    extractor: &ExtractorConfig,
    client_id: &str,
    end_date: NaiveDate,
    windows: &[Window],
) -> Result<(RollupReport, Vec<CallOutcome>)> {
    let Some(from) = windows.iter().map(|w| w.bounds().0).min() else {
        anyhow::bail!("no report windows requested");
    };
    let to = windows
        .iter()
        .map(|w| w.bounds().1)
        .max()
        .unwrap_or(end_date);

    let set = load_outcomes(calls, store, extractor, from, to)?;
    info!(
        calls = set.outcomes.len(),
        unclassified = set.unclassified,
        from = %from,
        to = %to,
        "Aggregating report windows"
    );

    let report = RollupReport {
        schema_version: REPORT_SCHEMA_VERSION,
        client_id: client_id.to_string(),
        generated_at: Utc::now(),
        end_date,
        unclassified_calls: set.unclassified,
        windows: windows
            .iter()
            .map(|w| aggregate_window(w, &set.outcomes))
            .collect(),
    };
    Ok((report, set.outcomes))
}
