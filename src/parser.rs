//! JSON parser for daily call exports.

use anyhow::Result;
use std::collections::HashMap;
use tracing::warn;

use crate::call::CallRecord;

/// Decodes a JSON array of call records from raw bytes.
///
/// Individual records that do not match [`CallRecord`] are skipped with a
/// warning; only a document that is not a JSON array is an error.
///
/// # Errors
///
/// Returns an error if the bytes are not a JSON array.
pub fn parse_calls(bytes: &[u8]) -> Result<Vec<CallRecord>> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let mut calls = Vec::with_capacity(raw.len());

    for (index, value) in raw.into_iter().enumerate() {
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("<missing>")
            .to_string();
        match serde_json::from_value::<CallRecord>(value) {
            Ok(call) => calls.push(call),
            Err(e) => warn!(index, call_id = %id, error = %e, "Skipping malformed call record"),
        }
    }

    Ok(dedup_calls(calls))
}

/// Keeps one record per call identifier; later records replace earlier ones
/// in place, so the result keeps first-seen order.
pub fn dedup_calls(calls: Vec<CallRecord>) -> Vec<CallRecord> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<CallRecord> = Vec::with_capacity(calls.len());

    for call in calls {
        match position.get(&call.id) {
            Some(&i) => out[i] = call,
            None => {
                position.insert(call.id.clone(), out.len());
                out.push(call);
            }
        }
    }

    out
}
