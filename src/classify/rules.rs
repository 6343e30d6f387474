//! Deterministic first-pass classifier.
//!
//! [`RULES`] is evaluated top to bottom and the first matching rule decides.
//! The order matters: a confirmed booking must win over the hang-up rules.

use serde_json::Value;

use crate::call::CallRecord;
use crate::classify::taxonomy::Classification;
use crate::features::{EndedReason, Features, SuccessEvaluation, UNKNOWN_DESTINATION};

/// Calls shorter than this are treated as abandoned noise.
pub const SHORT_CALL_SECONDS: f64 = 5.0;

/// Phrases in the transcript, summary or evaluation that confirm a booking.
pub const CONFIRMATION_PHRASES: &[&str] = &[
    "appointment is confirmed for",
    "consultation is confirmed for",
    "appointment has been booked for",
    "consultation has been booked for",
    "appointment has been scheduled for",
    "consultation has been scheduled for",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    Classified {
        classification: Classification,
        rule: &'static str,
    },
    /// The rules cannot decide; the call needs the language model.
    NeedsExternalJudgment { reason: &'static str },
}

pub struct RuleInput<'a> {
    pub call: &'a CallRecord,
    pub features: &'a Features,
}

pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&RuleInput) -> bool,
    pub outcome: fn(&RuleInput) -> RuleVerdict,
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "short-call",
        matches: |i| i.features.duration_seconds < SHORT_CALL_SECONDS,
        outcome: |_| {
            classified(
                "short-call",
                Classification::Spam {
                    spam_type: Some("short-abandoned".into()),
                },
            )
        },
    },
    Rule {
        name: "forwarded",
        matches: |i| i.features.ended_reason == EndedReason::AssistantForwardedCall,
        outcome: |i| {
            classified(
                "forwarded",
                Classification::Transferred {
                    transfer_reason: Some(resolved_destination(i)),
                },
            )
        },
    },
    Rule {
        name: "booking-flag",
        matches: |i| i.features.appointment_booked,
        outcome: |_| classified("booking-flag", Classification::BookingCompleted),
    },
    Rule {
        name: "booking-phrase",
        matches: |i| has_confirmation_phrase(i.call),
        outcome: |_| classified("booking-phrase", Classification::BookingCompleted),
    },
    Rule {
        name: "abandoned-transfer",
        matches: |i| {
            i.features.transfer_attempted()
                && i.features.ended_reason != EndedReason::AssistantForwardedCall
        },
        outcome: |i| {
            let destination = i
                .features
                .transfer_destination_hint
                .as_deref()
                .unwrap_or(UNKNOWN_DESTINATION);
            classified(
                "abandoned-transfer",
                Classification::Hangup {
                    hangup_type: None,
                    note: Some(format!("hung-up-during-transfer-to-{destination}")),
                },
            )
        },
    },
    Rule {
        name: "customer-ended",
        matches: |i| i.features.ended_reason == EndedReason::CustomerEndedCall,
        outcome: |_| {
            classified(
                "customer-ended",
                Classification::Hangup {
                    hangup_type: None,
                    note: Some("customer-hung-up".into()),
                },
            )
        },
    },
    Rule {
        name: "assistant-ended",
        matches: |i| i.features.ended_reason == EndedReason::AssistantEndedCall,
        outcome: |_| RuleVerdict::NeedsExternalJudgment {
            reason: "assistant-ended-call",
        },
    },
    Rule {
        name: "fallthrough",
        matches: |_| true,
        outcome: |_| RuleVerdict::NeedsExternalJudgment {
            reason: "no-rule-matched",
        },
    },
];

/// Runs the rule table against one call. Pure and side-effect free.
pub fn classify(call: &CallRecord, features: &Features) -> RuleVerdict {
    let input = RuleInput { call, features };
    RULES
        .iter()
        .find(|rule| (rule.matches)(&input))
        .map(|rule| (rule.outcome)(&input))
        .unwrap_or(RuleVerdict::NeedsExternalJudgment {
            reason: "no-rule-matched",
        })
}

fn classified(rule: &'static str, classification: Classification) -> RuleVerdict {
    RuleVerdict::Classified {
        classification,
        rule,
    }
}

fn resolved_destination(input: &RuleInput) -> String {
    let from_hint = input
        .features
        .transfer_destination_hint
        .as_deref()
        .filter(|h| *h != UNKNOWN_DESTINATION)
        .map(str::to_string);

    from_hint
        .or_else(|| input.call.destination.as_ref().and_then(destination_label))
        .unwrap_or_else(|| UNKNOWN_DESTINATION.to_string())
}

fn destination_label(destination: &Value) -> Option<String> {
    ["description", "name", "number"].iter().find_map(|k| {
        destination
            .get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn has_confirmation_phrase(call: &CallRecord) -> bool {
    let evaluation = call
        .success_evaluation()
        .and_then(SuccessEvaluation::from_value)
        .and_then(|e| e.outcome);

    [call.transcript(), call.summary(), evaluation.as_deref()]
        .into_iter()
        .flatten()
        .any(|text| {
            let text = text.to_lowercase();
            CONFIRMATION_PHRASES.iter().any(|p| text.contains(p))
        })
}
