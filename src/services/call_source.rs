//! Trait for pulling raw call records from a voice platform.

use anyhow::Result;
use call_outcome_rater::call::CallRecord;
use chrono::{DateTime, Utc};

/// Abstraction over a call-record provider.
#[async_trait::async_trait]
pub trait CallSource {
    /// Returns every call created in `[start, end)`, deduplicated by id.
    async fn list_calls(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CallRecord>>;
}
