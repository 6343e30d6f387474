//! Deterministic corrections applied after classification.
//!
//! Override A: the structured booking flag always wins.
//! Override B: an `Unknown` category is re-derived from how and when the
//! call ended, using [`UNKNOWN_FALLBACKS`] in order.

use crate::classify::taxonomy::{Classification, HangupType};
use crate::features::{EndedReason, Features};

/// Below this an unknown customer- or silence-ended call is spam.
pub const SPAM_FALLBACK_SECONDS: f64 = 10.0;
/// Below this an unknown hang-up is low-value, otherwise moderate.
pub const LOW_VALUE_HANGUP_SECONDS: f64 = 30.0;

pub struct Fallback {
    pub name: &'static str,
    pub matches: fn(&Features) -> bool,
    pub outcome: fn(&Features) -> Classification,
}

fn customer_or_silence(f: &Features) -> bool {
    matches!(
        f.ended_reason,
        EndedReason::CustomerEndedCall | EndedReason::SilenceTimedOut
    )
}

pub static UNKNOWN_FALLBACKS: &[Fallback] = &[
    Fallback {
        name: "forwarded",
        matches: |f| f.ended_reason == EndedReason::AssistantForwardedCall,
        outcome: |_| Classification::Transferred {
            transfer_reason: Some("other".into()),
        },
    },
    Fallback {
        name: "short-call",
        matches: |f| customer_or_silence(f) && f.duration_seconds < SPAM_FALLBACK_SECONDS,
        outcome: |_| Classification::Spam {
            spam_type: Some("short-call".into()),
        },
    },
    Fallback {
        name: "hangup",
        matches: |f| customer_or_silence(f) && f.duration_seconds >= SPAM_FALLBACK_SECONDS,
        outcome: |f| Classification::Hangup {
            hangup_type: Some(if f.duration_seconds < LOW_VALUE_HANGUP_SECONDS {
                HangupType::LowValue
            } else {
                HangupType::Moderate
            }),
            note: None,
        },
    },
];

/// Runs Override A then Override B.
pub fn apply_overrides(classification: Classification, features: &Features) -> Classification {
    let classification = booking_flag_override(classification, features);
    unknown_fallback(classification, features)
}

fn booking_flag_override(classification: Classification, features: &Features) -> Classification {
    if features.appointment_booked && classification != Classification::BookingCompleted {
        return Classification::BookingCompleted;
    }
    classification
}

fn unknown_fallback(classification: Classification, features: &Features) -> Classification {
    if classification != Classification::Unknown {
        return classification;
    }

    UNKNOWN_FALLBACKS
        .iter()
        .find(|fb| (fb.matches)(features))
        .map(|fb| (fb.outcome)(features))
        .unwrap_or(Classification::Unknown)
}
