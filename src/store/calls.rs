use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{day_path, list_days, write_json_atomic};
use crate::call::CallRecord;
use crate::parser::{dedup_calls, parse_calls};

/// Raw call arrays, one file per UTC day.
pub struct CallStore {
    dir: PathBuf,
}

impl CallStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("calls"),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        day_path(&self.dir, date)
    }

    /// Calls for `date`; a missing file is an empty day.
    pub fn load_day(&self, date: NaiveDate) -> Result<Vec<CallRecord>> {
        let path = self.path_for(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        parse_calls(&bytes).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Merges `calls` into the day file, replacing records with the same id.
    /// Returns the number of calls stored for the day.
    pub fn merge_day(&self, date: NaiveDate, calls: Vec<CallRecord>) -> Result<usize> {
        let mut merged = self.load_day(date)?;
        merged.extend(calls);
        let mut merged = dedup_calls(merged);
        merged.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        write_json_atomic(&self.path_for(date), &merged)?;
        debug!(date = %date, calls = merged.len(), "Call day file written");
        Ok(merged.len())
    }

    pub fn available_days(&self) -> Result<Vec<NaiveDate>> {
        list_days(&self.dir)
    }

    pub fn latest_day(&self) -> Result<Option<NaiveDate>> {
        Ok(self.available_days()?.pop())
    }
}

/// Buckets calls by their UTC creation day.
pub fn group_by_day(calls: Vec<CallRecord>) -> BTreeMap<NaiveDate, Vec<CallRecord>> {
    let mut days: BTreeMap<NaiveDate, Vec<CallRecord>> = BTreeMap::new();
    for call in calls {
        days.entry(call.day()).or_default().push(call);
    }
    days
}
