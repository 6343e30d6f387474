//! Normalized signals derived from one [`CallRecord`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::{CallRecord, ToolInvocation};

/// Hint used when a transfer tool was invoked but its destination could not
/// be read from the arguments.
pub const UNKNOWN_DESTINATION: &str = "unknown-destination";

/// Tool names treated as a transfer when no client override is configured.
pub const DEFAULT_TRANSFER_TOOLS: &[&str] = &[
    "transferCall",
    "transfer_call",
    "transfer_call_tool",
    "transferCallTool",
];

/// Argument keys searched for a transfer destination, highest priority first.
const DESTINATION_KEYS: &[&str] = &["destination", "intent", "department", "queue"];

const BOOKING_OUTPUT_NAME: &str = "appointment booked";
const APPOINTMENT_TERMS: &[&str] = &["appointment", "consultation"];
const CONFIRMATION_TERMS: &[&str] = &["scheduled", "confirmed", "booked"];

/// How the call ended, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndedReason {
    AssistantForwardedCall,
    CustomerEndedCall,
    AssistantEndedCall,
    SilenceTimedOut,
    Unknown,
}

impl EndedReason {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("assistant-forwarded-call") => Self::AssistantForwardedCall,
            Some("customer-ended-call") => Self::CustomerEndedCall,
            Some("assistant-ended-call") => Self::AssistantEndedCall,
            Some("silence-timed-out") => Self::SilenceTimedOut,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssistantForwardedCall => "assistant-forwarded-call",
            Self::CustomerEndedCall => "customer-ended-call",
            Self::AssistantEndedCall => "assistant-ended-call",
            Self::SilenceTimedOut => "silence-timed-out",
            Self::Unknown => "unknown",
        }
    }
}

/// Knobs for feature extraction that vary per client.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub transfer_tool_names: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            transfer_tool_names: DEFAULT_TRANSFER_TOOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExtractorConfig {
    fn is_transfer_tool(&self, name: &str) -> bool {
        self.transfer_tool_names
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub duration_seconds: f64,
    pub ended_reason: EndedReason,
    /// `None` when no transfer was attempted; [`UNKNOWN_DESTINATION`] when
    /// one was attempted with unreadable arguments.
    pub transfer_destination_hint: Option<String>,
    pub appointment_booked: bool,
}

impl Features {
    /// Extracts features from a call. Never fails: missing or malformed
    /// inputs degrade to their defaults.
    pub fn from_call(call: &CallRecord, config: &ExtractorConfig) -> Self {
        Features {
            duration_seconds: duration_seconds(call),
            ended_reason: EndedReason::from_code(call.ended_reason.as_deref()),
            transfer_destination_hint: transfer_destination_hint(call, config),
            appointment_booked: appointment_booked(call),
        }
    }

    pub fn transfer_attempted(&self) -> bool {
        self.transfer_destination_hint.is_some()
    }
}

fn duration_seconds(call: &CallRecord) -> f64 {
    if let Some(d) = call.duration_seconds {
        if d.is_finite() && d >= 0.0 {
            return d;
        }
    }

    match (call.started_at, call.ended_at) {
        (Some(start), Some(end)) => {
            let secs = (end - start).num_milliseconds() as f64 / 1000.0;
            secs.max(0.0)
        }
        _ => 0.0,
    }
}

fn transfer_destination_hint(call: &CallRecord, config: &ExtractorConfig) -> Option<String> {
    let invocation = call
        .tool_invocations()
        .find(|t| config.is_transfer_tool(&t.function.name))?;

    Some(parse_destination(invocation).unwrap_or_else(|| UNKNOWN_DESTINATION.to_string()))
}

fn parse_destination(invocation: &ToolInvocation) -> Option<String> {
    let args = match invocation.function.arguments.as_ref()? {
        Value::String(s) => serde_json::from_str::<Value>(s).ok()?,
        other => other.clone(),
    };
    let args = args.as_object()?;

    DESTINATION_KEYS.iter().find_map(|key| {
        args.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn appointment_booked(call: &CallRecord) -> bool {
    if call.structured_outputs().is_some_and(booking_output_is_true) {
        return true;
    }

    match call.success_evaluation().and_then(SuccessEvaluation::from_value) {
        Some(eval) => eval.indicates_booking(),
        None => false,
    }
}

/// Structured outputs arrive either as a map of id to `{name, result}` or as
/// a list of such objects; a bare `{"Appointment Booked": true}` map is also
/// accepted.
fn booking_output_is_true(outputs: &Value) -> bool {
    let entries: Vec<&Value> = match outputs {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let direct = map
                .iter()
                .any(|(k, v)| k.trim().eq_ignore_ascii_case(BOOKING_OUTPUT_NAME) && is_truthy(v));
            if direct {
                return true;
            }
            map.values().collect()
        }
        _ => return false,
    };

    entries.into_iter().any(|entry| {
        let named = entry
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| n.trim().eq_ignore_ascii_case(BOOKING_OUTPUT_NAME));
        named && entry.get("result").is_some_and(is_truthy)
    })
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Parsed success-evaluation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessEvaluation {
    pub success: bool,
    pub outcome: Option<String>,
}

impl SuccessEvaluation {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self {
                success: *b,
                outcome: None,
            }),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(inner @ Value::Object(_)) => Self::from_value(&inner),
                _ => Some(Self {
                    success: s.trim().eq_ignore_ascii_case("true"),
                    outcome: None,
                }),
            },
            Value::Object(map) => {
                let success = ["success", "successful", "result"]
                    .iter()
                    .find_map(|k| map.get(*k))
                    .is_some_and(is_truthy);
                let outcome = map
                    .get("outcome")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(Self { success, outcome })
            }
            _ => None,
        }
    }

    /// Success plus an outcome naming a confirmed appointment that was not a
    /// transfer.
    pub fn indicates_booking(&self) -> bool {
        if !self.success {
            return false;
        }
        let Some(outcome) = self.outcome.as_deref() else {
            return false;
        };
        let outcome = outcome.to_lowercase();

        APPOINTMENT_TERMS.iter().any(|t| outcome.contains(t))
            && CONFIRMATION_TERMS.iter().any(|t| outcome.contains(t))
            && !outcome.contains("transferred")
    }
}
