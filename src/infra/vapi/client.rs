use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;
use tracing::{debug, info};

use call_outcome_rater::call::CallRecord;
use call_outcome_rater::fetch::auth::ApiKey;
use call_outcome_rater::fetch::{BasicClient, fetch_bytes};
use call_outcome_rater::parser::{dedup_calls, parse_calls};

use crate::services::call_source::CallSource;

/// Client for the voice platform's `GET /call` listing.
///
/// The listing returns newest calls first, `limit` at a time; older pages
/// are reached by moving `createdAtLt` back to the oldest call seen.
pub struct VoicePlatformClient {
    http: ApiKey<BasicClient>,
    base_url: String,
    page_size: usize,
}

impl VoicePlatformClient {
    pub fn new(api_key: &str, base_url: impl Into<String>, page_size: usize) -> Result<Self> {
        let http = ApiKey::bearer(BasicClient::with_timeout(Duration::from_secs(30))?, api_key)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            page_size,
        })
    }

    fn page_url(&self, start: DateTime<Utc>, before: DateTime<Utc>) -> Result<String> {
        let base = self.base_url.trim_end_matches('/');
        let url = reqwest::Url::parse_with_params(
            &format!("{base}/call"),
            &[
                ("createdAtGe", start.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("createdAtLt", before.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("limit", self.page_size.to_string()),
            ],
        )?;
        Ok(url.into())
    }
}

#[async_trait]
impl CallSource for VoicePlatformClient {
    async fn list_calls(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CallRecord>> {
        let mut calls = Vec::new();
        let mut before = end;
        let mut pages = 0usize;

        loop {
            let url = self.page_url(start, before)?;
            let bytes = fetch_bytes(&self.http, &url)
                .await
                .context("voice platform call listing failed")?;
            let page = parse_calls(&bytes).context("failed to parse call listing")?;
            pages += 1;
            debug!(page = pages, calls = page.len(), before = %before, "Call page fetched");

            let full = page.len() >= self.page_size;
            let oldest = page.iter().map(|c| c.created_at).min();
            calls.extend(page);

            match oldest {
                Some(oldest) if full && oldest < before => before = oldest,
                _ => break,
            }
        }

        let calls = dedup_calls(calls);
        info!(calls = calls.len(), pages, start = %start, end = %end, "Calls listed");
        Ok(calls)
    }
}
