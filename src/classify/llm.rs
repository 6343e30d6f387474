//! Batch classification through a language model.
//!
//! The model's answer is untrusted. Anything that cannot be read back into
//! the taxonomy becomes [`Classification::Unknown`] for the affected calls;
//! no call in a batch is ever left without a classification.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, warn};

use crate::call::CallRecord;
use crate::classify::taxonomy::{Category, Classification, HangupType};
use crate::features::Features;
use crate::llm::ChatModel;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_TRANSCRIPT_CHARS: usize = 500;

pub const SYSTEM_PROMPT: &str = "\
You classify inbound phone calls handled by a voice assistant for a booking business.
Assign every call exactly one category:
- booking-completed: an appointment or consultation was booked and confirmed
- booking-abandoned: the caller wanted to book but did not finish
- booking-transferred: the caller wanted to book and was transferred to staff
- transferred: the call was transferred to staff for a non-booking reason
- spam: robocalls, wrong numbers, silence or solicitation
- hangup: the caller hung up before anything useful happened
Set transferReason only for transferred and booking-transferred, spamType only for spam,
and hangupType (high-value, moderate or low-value) only for hangup. Use null otherwise.
The summary is the primary evidence; the transcript excerpt is supplementary.
Respond with a JSON object: {\"calls\": [{\"callId\", \"category\", \"transferReason\", \"spamType\", \"hangupType\"}]}
with one entry per input call.";

/// One call handed to the model together with its extracted features.
#[derive(Debug, Clone, Copy)]
pub struct BatchItem<'a> {
    pub call: &'a CallRecord,
    pub features: &'a Features,
}

/// Result of one batch, aligned with the input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchClassification {
    pub results: Vec<Classification>,
    /// Calls degraded to `Unknown` because the response did not cover them.
    pub degraded: usize,
    /// Per call, aligned with `results`: true when the call was degraded
    /// and should go back to the model on the next run.
    pub needs_retry: Vec<bool>,
    pub request_failed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptCall<'a> {
    call_id: &'a str,
    #[serde(flatten)]
    features: &'a Features,
    summary: Option<&'a str>,
    transcript_excerpt: Option<String>,
}

#[derive(Serialize)]
struct PromptBody<'a> {
    calls: Vec<PromptCall<'a>>,
}

pub struct LlmClassifier<M> {
    model: M,
    transcript_chars: usize,
}

impl<M: ChatModel> LlmClassifier<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            transcript_chars: DEFAULT_TRANSCRIPT_CHARS,
        }
    }

    pub fn with_transcript_chars(mut self, chars: usize) -> Self {
        self.transcript_chars = chars;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Classifies one batch. Never fails: request errors and unreadable
    /// responses degrade calls to `Unknown`, leaving recovery to the
    /// override chain. There is no retry here.
    #[tracing::instrument(skip_all, fields(batch_size = batch.len(), model = %self.model.model_name()))]
    pub async fn classify_batch(&self, batch: &[BatchItem<'_>]) -> BatchClassification {
        if batch.is_empty() {
            return BatchClassification {
                results: Vec::new(),
                degraded: 0,
                needs_retry: Vec::new(),
                request_failed: false,
            };
        }

        let user = match build_user_prompt(batch, self.transcript_chars) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(error = %e, "Failed to build classification prompt");
                return all_unknown(batch.len(), true);
            }
        };

        let reply = match self.model.complete(SYSTEM_PROMPT, &user).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Classification request failed; degrading batch to unknown");
                return all_unknown(batch.len(), true);
            }
        };

        let mut parsed = match parse_response(&reply) {
            Ok(map) => map,
            Err(reason) => {
                warn!(%reason, "Unreadable classification response; degrading batch to unknown");
                return all_unknown(batch.len(), false);
            }
        };

        let mut needs_retry = Vec::with_capacity(batch.len());
        let results = batch
            .iter()
            .map(|item| match parsed.remove(&item.call.id) {
                Some(c) => {
                    needs_retry.push(false);
                    c
                }
                None => {
                    needs_retry.push(true);
                    warn!(call_id = %item.call.id, "Call missing from classification response");
                    Classification::Unknown
                }
            })
            .collect();
        let degraded = needs_retry.iter().filter(|r| **r).count();

        if !parsed.is_empty() {
            debug!(extra = parsed.len(), "Response contained call ids not in the batch");
        }

        BatchClassification {
            results,
            degraded,
            needs_retry,
            request_failed: false,
        }
    }
}

fn all_unknown(len: usize, request_failed: bool) -> BatchClassification {
    BatchClassification {
        results: vec![Classification::Unknown; len],
        degraded: len,
        needs_retry: vec![true; len],
        request_failed,
    }
}

/// Serializes the batch as the user prompt. Transcripts are cut to
/// `transcript_chars` characters.
pub fn build_user_prompt(
    batch: &[BatchItem<'_>],
    transcript_chars: usize,
) -> serde_json::Result<String> {
    let calls = batch
        .iter()
        .map(|item| PromptCall {
            call_id: &item.call.id,
            features: item.features,
            summary: item.call.summary(),
            transcript_excerpt: item
                .call
                .transcript()
                .map(|t| t.chars().take(transcript_chars).collect()),
        })
        .collect();

    serde_json::to_string(&PromptBody { calls })
}

/// Reads a model reply of the form `{"calls": [...]}` into classifications
/// keyed by call id.
///
/// Entries without a `callId` are ignored; entries with an unrecognised
/// category map to `Unknown`. Any other shape is an error.
pub fn parse_response(reply: &str) -> Result<HashMap<String, Classification>, String> {
    let body: Value =
        serde_json::from_str(strip_code_fence(reply)).map_err(|e| format!("not JSON: {e}"))?;
    let calls = body
        .get("calls")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing `calls` array".to_string())?;

    let mut out = HashMap::with_capacity(calls.len());
    for entry in calls {
        let Some(call_id) = entry.get("callId").and_then(Value::as_str) else {
            continue;
        };
        out.insert(call_id.to_string(), entry_to_classification(entry));
    }
    Ok(out)
}

fn entry_to_classification(entry: &Value) -> Classification {
    let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);

    let Some(category) = entry
        .get("category")
        .and_then(Value::as_str)
        .and_then(Category::parse)
    else {
        return Classification::Unknown;
    };

    Classification::from_parts(
        category,
        text("transferReason"),
        text("spamType"),
        text("hangupType").as_deref().and_then(HangupType::parse),
        None,
    )
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
