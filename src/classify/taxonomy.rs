//! Call outcome categories.
//!
//! [`Classification`] carries only the sub-fields its category allows.
//! [`ClassificationRecord`] is the flat form written to the store and
//! exchanged with the language model.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    BookingCompleted,
    BookingAbandoned,
    BookingTransferred,
    Transferred,
    Spam,
    Hangup,
    Unknown,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::BookingCompleted,
        Category::BookingAbandoned,
        Category::BookingTransferred,
        Category::Transferred,
        Category::Spam,
        Category::Hangup,
        Category::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BookingCompleted => "booking-completed",
            Category::BookingAbandoned => "booking-abandoned",
            Category::BookingTransferred => "booking-transferred",
            Category::Transferred => "transferred",
            Category::Spam => "spam",
            Category::Hangup => "hangup",
            Category::Unknown => "unknown",
        }
    }

    /// Lenient parse: case-insensitive, `_` and spaces read as `-`.
    pub fn parse(raw: &str) -> Option<Self> {
        let norm = normalize_token(raw);
        Self::ALL.into_iter().find(|c| c.as_str() == norm)
    }

    /// Booking-intent categories, counted as eligible leads.
    pub fn is_booking(&self) -> bool {
        self.as_str().starts_with("booking")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HangupType {
    HighValue,
    Moderate,
    LowValue,
}

impl HangupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HangupType::HighValue => "high-value",
            HangupType::Moderate => "moderate",
            HangupType::LowValue => "low-value",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "high-value" | "high" => Some(HangupType::HighValue),
            "moderate" | "medium" => Some(HangupType::Moderate),
            "low-value" | "low" => Some(HangupType::LowValue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    BookingAttempt,
    None,
}

/// Final outcome of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    BookingCompleted,
    BookingAbandoned,
    BookingTransferred { transfer_reason: Option<String> },
    Transferred { transfer_reason: Option<String> },
    Spam { spam_type: Option<String> },
    /// `note` records how the call ended, e.g. a hang-up during a transfer.
    Hangup {
        hangup_type: Option<HangupType>,
        note: Option<String>,
    },
    Unknown,
}

impl Classification {
    pub fn category(&self) -> Category {
        match self {
            Classification::BookingCompleted => Category::BookingCompleted,
            Classification::BookingAbandoned => Category::BookingAbandoned,
            Classification::BookingTransferred { .. } => Category::BookingTransferred,
            Classification::Transferred { .. } => Category::Transferred,
            Classification::Spam { .. } => Category::Spam,
            Classification::Hangup { .. } => Category::Hangup,
            Classification::Unknown => Category::Unknown,
        }
    }

    pub fn booking_status(&self) -> BookingStatus {
        if self.category().is_booking() {
            BookingStatus::BookingAttempt
        } else {
            BookingStatus::None
        }
    }

    pub fn transfer_reason(&self) -> Option<&str> {
        match self {
            Classification::BookingTransferred { transfer_reason }
            | Classification::Transferred { transfer_reason } => transfer_reason.as_deref(),
            _ => None,
        }
    }

    pub fn spam_type(&self) -> Option<&str> {
        match self {
            Classification::Spam { spam_type } => spam_type.as_deref(),
            _ => None,
        }
    }

    pub fn hangup_type(&self) -> Option<HangupType> {
        match self {
            Classification::Hangup { hangup_type, .. } => *hangup_type,
            _ => None,
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Classification::Hangup { note, .. } => note.as_deref(),
            _ => None,
        }
    }

    /// Whichever sub-type field the category carries, as display text.
    pub fn sub_type(&self) -> Option<String> {
        self.transfer_reason()
            .map(str::to_string)
            .or_else(|| self.spam_type().map(str::to_string))
            .or_else(|| self.hangup_type().map(|h| h.as_str().to_string()))
            .or_else(|| self.note().map(str::to_string))
    }

    pub fn to_record(&self) -> ClassificationRecord {
        ClassificationRecord {
            category: self.category(),
            hangup_type: self.hangup_type(),
            transfer_reason: self.transfer_reason().map(str::to_string),
            spam_type: self.spam_type().map(str::to_string),
            booking_status: self.booking_status(),
            note: self.note().map(str::to_string),
        }
    }

    /// Builds a classification from a category and loose sub-fields, keeping
    /// only the fields the category allows.
    pub fn from_parts(
        category: Category,
        transfer_reason: Option<String>,
        spam_type: Option<String>,
        hangup_type: Option<HangupType>,
        note: Option<String>,
    ) -> Self {
        let clean = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        match category {
            Category::BookingCompleted => Classification::BookingCompleted,
            Category::BookingAbandoned => Classification::BookingAbandoned,
            Category::BookingTransferred => Classification::BookingTransferred {
                transfer_reason: clean(transfer_reason),
            },
            Category::Transferred => Classification::Transferred {
                transfer_reason: clean(transfer_reason),
            },
            Category::Spam => Classification::Spam {
                spam_type: clean(spam_type),
            },
            Category::Hangup => Classification::Hangup {
                hangup_type,
                note: clean(note),
            },
            Category::Unknown => Classification::Unknown,
        }
    }
}

/// Flat, persisted form of a [`Classification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    pub category: Category,
    pub hangup_type: Option<HangupType>,
    pub transfer_reason: Option<String>,
    pub spam_type: Option<String>,
    pub booking_status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<&Classification> for ClassificationRecord {
    fn from(c: &Classification) -> Self {
        c.to_record()
    }
}

impl From<ClassificationRecord> for Classification {
    /// Sub-fields not allowed by the category are dropped and
    /// `bookingStatus` is recomputed rather than trusted.
    fn from(r: ClassificationRecord) -> Self {
        Classification::from_parts(r.category, r.transfer_reason, r.spam_type, r.hangup_type, r.note)
    }
}

fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_lenient() {
        assert_eq!(Category::parse("booking-completed"), Some(Category::BookingCompleted));
        assert_eq!(Category::parse("BOOKING_TRANSFERRED"), Some(Category::BookingTransferred));
        assert_eq!(Category::parse(" Hangup "), Some(Category::Hangup));
        assert_eq!(Category::parse("voicemail"), None);
    }

    #[test]
    fn test_booking_status_follows_category() {
        assert_eq!(
            Classification::BookingAbandoned.booking_status(),
            BookingStatus::BookingAttempt
        );
        assert_eq!(
            Classification::Transferred { transfer_reason: None }.booking_status(),
            BookingStatus::None
        );
    }

    #[test]
    fn test_from_parts_drops_foreign_fields() {
        let c = Classification::from_parts(
            Category::Spam,
            Some("sales".into()),
            Some("robocall".into()),
            Some(HangupType::Moderate),
            None,
        );
        assert_eq!(c, Classification::Spam { spam_type: Some("robocall".into()) });

        let record = c.to_record();
        assert_eq!(record.transfer_reason, None);
        assert_eq!(record.hangup_type, None);
        assert_eq!(record.spam_type.as_deref(), Some("robocall"));
    }

    #[test]
    fn test_record_wire_shape() {
        let c = Classification::Hangup {
            hangup_type: Some(HangupType::LowValue),
            note: Some("customer-hung-up".into()),
        };
        let json = serde_json::to_value(c.to_record()).unwrap();

        assert_eq!(json["category"], "hangup");
        assert_eq!(json["hangupType"], "low-value");
        assert_eq!(json["transferReason"], serde_json::Value::Null);
        assert_eq!(json["bookingStatus"], "none");
        assert_eq!(json["note"], "customer-hung-up");
    }

    #[test]
    fn test_record_ignores_stale_booking_status() {
        let record = ClassificationRecord {
            category: Category::Hangup,
            hangup_type: None,
            transfer_reason: Some("sales".into()),
            spam_type: None,
            booking_status: BookingStatus::BookingAttempt,
            note: None,
        };
        let c = Classification::from(record);
        assert_eq!(c.booking_status(), BookingStatus::None);
        assert_eq!(c.transfer_reason(), None);
    }
}
