use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{day_path, list_days, write_json_atomic};
use crate::call::CallRecord;
use crate::classify::taxonomy::{Classification, ClassificationRecord};

/// One persisted classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentEntry {
    pub call_id: String,
    pub created_at: DateTime<Utc>,
    pub enriched_at: DateTime<Utc>,
    pub model: String,
    pub classification: ClassificationRecord,
    /// The model gave no usable answer; the next run sends the call again.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl EnrichmentEntry {
    pub fn new(call: &CallRecord, classification: &Classification, model: &str) -> Self {
        Self {
            call_id: call.id.clone(),
            created_at: call.created_at,
            enriched_at: Utc::now(),
            model: model.to_string(),
            classification: classification.to_record(),
            degraded: false,
        }
    }

    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    pub fn classification(&self) -> Classification {
        Classification::from(self.classification.clone())
    }
}

/// Final classifications, one JSON object per UTC day keyed by call id.
pub struct ClassificationStore {
    dir: PathBuf,
}

impl ClassificationStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("enrichments"),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        day_path(&self.dir, date)
    }

    pub fn load_day(&self, date: NaiveDate) -> Result<BTreeMap<String, EnrichmentEntry>> {
        let path = self.path_for(date);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Merges entries into the day file. An entry replaces any existing
    /// entry with the same call id; nothing else is removed. Returns the
    /// number of entries stored for the day.
    pub fn merge_day(
        &self,
        date: NaiveDate,
        entries: impl IntoIterator<Item = EnrichmentEntry>,
    ) -> Result<usize> {
        let mut day = self.load_day(date)?;
        let mut written = 0usize;
        for entry in entries {
            day.insert(entry.call_id.clone(), entry);
            written += 1;
        }
        if written == 0 {
            return Ok(day.len());
        }

        write_json_atomic(&self.path_for(date), &day)?;
        debug!(date = %date, written, total = day.len(), "Enrichment day file merged");
        Ok(day.len())
    }

    pub fn available_days(&self) -> Result<Vec<NaiveDate>> {
        list_days(&self.dir)
    }
}
