//! On-disk day files.
//!
//! ```text
//! {data_dir}/calls/YYYY-MM-DD.json        raw calls, JSON array
//! {data_dir}/enrichments/YYYY-MM-DD.json  call id -> classification entry
//! ```
//!
//! Both kinds are merge-on-write: existing entries are loaded, new entries
//! replace old ones with the same call id, and the file is replaced
//! atomically. There is no locking; concurrent runs against one data
//! directory must be serialized by the caller.

mod calls;
mod enrichment;

pub use calls::{CallStore, group_by_day};
pub use enrichment::{ClassificationStore, EnrichmentEntry};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const DAY_FORMAT: &str = "%Y-%m-%d";

fn day_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.json", date.format(DAY_FORMAT)))
}

/// Writes `value` as pretty JSON to a sibling temp file, then renames it
/// over `path`.
fn write_json_atomic(path: &Path, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Days with a `YYYY-MM-DD.json` file in `dir`, ascending.
fn list_days(dir: &Path) -> Result<Vec<NaiveDate>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut days = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(day) = NaiveDate::parse_from_str(stem, DAY_FORMAT) {
            days.push(day);
        }
    }
    days.sort();
    Ok(days)
}
