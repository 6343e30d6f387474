//! Raw call records as delivered by the voice platform.
//!
//! These types are read-only to the rest of the crate. Fields the classifier
//! does not look at are kept in `extra` so day files can be rewritten without
//! losing vendor data.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inbound call: timestamps, ending, transcript and tool activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Recorded duration, when the platform reports one directly.
    #[serde(default, alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<CallMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<CallAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<CallArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    /// Forwarding destination reported by the platform for forwarded calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single transcript turn or tool-call message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMessage {
    pub role: String,
    #[serde(default, alias = "content", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_from_start: Option<f64>,
}

/// A tool call made by the assistant during the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    /// Either a JSON-encoded string or an inline object, depending on the
    /// platform version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Post-call analysis produced by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_evaluation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
}

/// Recording artifacts: transcript, message log and structured outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<CallMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_outputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CallRecord {
    /// UTC calendar day the call belongs to.
    pub fn day(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .or_else(|| self.analysis.as_ref()?.summary.as_deref())
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .or_else(|| self.artifact.as_ref()?.transcript.as_deref())
    }

    /// Message log, preferring the top-level list and falling back to the
    /// artifact copy.
    pub fn messages(&self) -> &[CallMessage] {
        if !self.messages.is_empty() {
            return &self.messages;
        }
        self.artifact
            .as_ref()
            .map(|a| a.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Every tool invocation, top-level first, then per message.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.tool_calls
            .iter()
            .chain(self.messages().iter().flat_map(|m| m.tool_calls.iter()))
    }

    pub fn structured_outputs(&self) -> Option<&Value> {
        self.artifact.as_ref()?.structured_outputs.as_ref()
    }

    pub fn success_evaluation(&self) -> Option<&Value> {
        self.analysis.as_ref()?.success_evaluation.as_ref()
    }
}

impl CallMessage {
    /// True for customer turns carrying at least one non-whitespace token.
    pub fn is_customer_speech(&self) -> bool {
        matches!(self.role.as_str(), "customer" | "user")
            && self
                .message
                .as_deref()
                .is_some_and(|m| !m.trim().is_empty())
    }
}
