//! Per-call routing status.
//!
//! [`RESOLVERS`] is checked in order and the first match decides, so every
//! call lands in exactly one of the five buckets.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::call::CallRecord;
use crate::classify::taxonomy::{Category, Classification};
use crate::features::{EndedReason, Features};

/// Calls at or under this length with no customer speech are likely spam.
pub const SPAM_LIKELY_MAX_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStatus {
    Routed,
    NotRouted,
    HangupBeforeRoute,
    Spam,
    SpamLikely,
}

impl RoutingStatus {
    pub const ALL: [RoutingStatus; 5] = [
        RoutingStatus::Routed,
        RoutingStatus::NotRouted,
        RoutingStatus::HangupBeforeRoute,
        RoutingStatus::Spam,
        RoutingStatus::SpamLikely,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStatus::Routed => "routed",
            RoutingStatus::NotRouted => "not-routed",
            RoutingStatus::HangupBeforeRoute => "hangup-before-route",
            RoutingStatus::Spam => "spam",
            RoutingStatus::SpamLikely => "spam-likely",
        }
    }
}

impl fmt::Display for RoutingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct RoutingInput<'a> {
    pub call: &'a CallRecord,
    pub features: &'a Features,
    pub classification: &'a Classification,
}

pub struct Resolver {
    pub status: RoutingStatus,
    pub matches: fn(&RoutingInput) -> bool,
}

pub static RESOLVERS: &[Resolver] = &[
    Resolver {
        status: RoutingStatus::Routed,
        matches: |i| i.features.ended_reason == EndedReason::AssistantForwardedCall,
    },
    Resolver {
        status: RoutingStatus::HangupBeforeRoute,
        matches: |i| {
            i.features.transfer_attempted()
                && i.features.ended_reason == EndedReason::CustomerEndedCall
        },
    },
    Resolver {
        status: RoutingStatus::SpamLikely,
        matches: |i| {
            i.features.duration_seconds <= SPAM_LIKELY_MAX_SECONDS && !has_customer_speech(i.call)
        },
    },
    Resolver {
        status: RoutingStatus::Spam,
        matches: |i| i.classification.category() == Category::Spam,
    },
];

pub fn resolve(
    call: &CallRecord,
    features: &Features,
    classification: &Classification,
) -> RoutingStatus {
    let input = RoutingInput {
        call,
        features,
        classification,
    };
    RESOLVERS
        .iter()
        .find(|r| (r.matches)(&input))
        .map(|r| r.status)
        .unwrap_or(RoutingStatus::NotRouted)
}

/// At least one customer message with a non-whitespace token.
pub fn has_customer_speech(call: &CallRecord) -> bool {
    call.messages().iter().any(|m| m.is_customer_speech())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CallMessage, ToolFunction, ToolInvocation};
    use crate::classify::classify_offline;
    use crate::features::ExtractorConfig;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn call(duration: f64, ended: &str) -> CallRecord {
        CallRecord {
            id: "c1".into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap(),
            duration_seconds: Some(duration),
            ended_reason: Some(ended.into()),
            ..Default::default()
        }
    }

    fn spoke(call: &mut CallRecord) {
        call.messages.push(CallMessage {
            role: "user".into(),
            message: Some("Hi, I'd like to book".into()),
            ..Default::default()
        });
    }

    fn route(call: &CallRecord) -> (Classification, RoutingStatus) {
        let f = Features::from_call(call, &ExtractorConfig::default());
        let c = classify_offline(call, &f);
        let status = resolve(call, &f, &c);
        (c, status)
    }

    #[test]
    fn test_forwarded_is_routed() {
        let mut c = call(3.0, "assistant-forwarded-call");
        spoke(&mut c);
        assert_eq!(route(&c).1, RoutingStatus::Routed);
    }

    #[test]
    fn test_failed_transfer_to_sales() {
        let mut c = call(50.0, "customer-ended-call");
        spoke(&mut c);
        c.tool_calls.push(ToolInvocation {
            id: None,
            function: ToolFunction {
                name: "transferCall".into(),
                arguments: Some(json!({"destination": "sales"})),
            },
        });

        let (classification, status) = route(&c);
        assert_eq!(classification.category(), Category::Hangup);
        assert!(classification
            .note()
            .unwrap()
            .contains("hung-up-during-transfer-to-sales"));
        assert_eq!(status, RoutingStatus::HangupBeforeRoute);
    }

    #[test]
    fn test_short_silent_call_is_spam_likely() {
        let c = call(3.0, "customer-ended-call");
        let (classification, status) = route(&c);
        assert_eq!(classification.category(), Category::Spam);
        assert_eq!(status, RoutingStatus::SpamLikely);
    }

    #[test]
    fn test_spam_classification_with_speech_is_spam() {
        let mut c = call(4.0, "silence-timed-out");
        spoke(&mut c);
        assert_eq!(route(&c).1, RoutingStatus::Spam);
    }

    #[test]
    fn test_long_silent_call_is_not_spam_likely() {
        let c = call(10.5, "assistant-ended-call");
        let f = Features::from_call(&c, &ExtractorConfig::default());
        assert_eq!(
            resolve(&c, &f, &Classification::BookingAbandoned),
            RoutingStatus::NotRouted
        );
    }

    #[test]
    fn test_whitespace_only_is_not_speech() {
        let mut c = call(8.0, "customer-ended-call");
        c.messages.push(CallMessage {
            role: "user".into(),
            message: Some(" \n\t".into()),
            ..Default::default()
        });
        assert!(!has_customer_speech(&c));
    }
}
