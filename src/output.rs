//! Output formatting and persistence for call outcomes and reports.
//!
//! Supports JSON on stdout, JSON files and CSV append.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::analyzers::aggregate::CallOutcome;
use crate::classify::taxonomy::BookingStatus;
use csv::WriterBuilder;
use std::fs::{self, OpenOptions};
use std::path::Path;

/// One report-ready CSV row per call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRow {
    pub call_id: String,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub ended_reason: &'static str,
    pub category: &'static str,
    pub sub_type: Option<String>,
    pub booking_status: BookingStatus,
    pub routing_status: &'static str,
}

impl From<&CallOutcome> for OutcomeRow {
    fn from(o: &CallOutcome) -> Self {
        Self {
            call_id: o.call_id.clone(),
            created_at: o.created_at,
            duration_seconds: o.duration_seconds,
            ended_reason: o.ended_reason.as_str(),
            category: o.classification.category().as_str(),
            sub_type: o.classification.sub_type(),
            booking_status: o.classification.booking_status(),
            routing_status: o.routing_status.as_str(),
        }
    }
}

/// Prints a value as pretty-printed JSON on stdout.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a value as pretty-printed JSON, creating parent directories.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("failed to write {path}"))?;
    debug!(path, "JSON written");
    Ok(())
}

/// Appends rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &str, rows: &[OutcomeRow]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::taxonomy::Classification;
    use crate::features::EndedReason;
    use crate::routing::RoutingStatus;
    use chrono::TimeZone;

    fn row(id: &str) -> OutcomeRow {
        OutcomeRow::from(&CallOutcome {
            call_id: id.into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap(),
            duration_seconds: 42.0,
            ended_reason: EndedReason::CustomerEndedCall,
            classification: Classification::Hangup {
                hangup_type: None,
                note: Some("customer-hung-up".into()),
            },
            routing_status: RoutingStatus::NotRouted,
        })
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&row("c1")).unwrap();
    }

    #[test]
    fn test_row_fields() {
        let r = row("c1");
        assert_eq!(r.category, "hangup");
        assert_eq!(r.sub_type.as_deref(), Some("customer-hung-up"));
        assert_eq!(r.routing_status, "not-routed");
        assert_eq!(r.booking_status, BookingStatus::None);
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let path = path.to_str().unwrap();

        append_records(path, &[row("a")]).unwrap();
        append_records(path, &[row("b"), row("c")]).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("callId,createdAt"));
        assert_eq!(lines.iter().filter(|l| l.contains("callId")).count(), 1);
    }

    #[test]
    fn test_booking_status_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let path = path.to_str().unwrap();

        let booked = OutcomeRow::from(&CallOutcome {
            call_id: "b".into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 11, 0, 0).unwrap(),
            duration_seconds: 90.0,
            ended_reason: EndedReason::AssistantEndedCall,
            classification: Classification::BookingAbandoned,
            routing_status: RoutingStatus::NotRouted,
        });
        assert_eq!(booked.booking_status, BookingStatus::BookingAttempt);
        append_records(path, &[row("a"), booked]).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert!(lines[1].contains(",none,"));
        assert!(lines[2].contains(",booking-attempt,"));
    }

    #[test]
    fn test_write_json_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/nested/out.json");
        let path = path.to_str().unwrap();

        write_json(path, &row("c1")).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back["callId"], "c1");
    }
}
