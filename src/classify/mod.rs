//! Call outcome classification.
//!
//! Calls go through the rule table first ([`rules`]); the calls the rules
//! cannot decide are batched to a language model ([`llm`]). Every final
//! answer passes through the override chain ([`overrides`]).

pub mod llm;
pub mod overrides;
pub mod rules;
pub mod taxonomy;

use serde::{Deserialize, Serialize};

use crate::call::CallRecord;
use crate::features::Features;
use overrides::apply_overrides;
use rules::RuleVerdict;
use taxonomy::Classification;

/// Model name recorded for classifications decided without a language model.
pub const RULES_MODEL: &str = "rules";

/// Which classifiers take part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Rules first, the model only for calls the rules cannot decide.
    #[default]
    Hybrid,
    /// Every call goes to the model.
    Llm,
    /// No external calls.
    Rules,
}

impl ClassifierMode {
    pub fn uses_model(&self) -> bool {
        !matches!(self, ClassifierMode::Rules)
    }
}

/// Rule table plus overrides, with no external calls. Calls the rules hand
/// off become `Unknown` before the overrides run.
pub fn classify_offline(call: &CallRecord, features: &Features) -> Classification {
    let raw = match rules::classify(call, features) {
        RuleVerdict::Classified { classification, .. } => classification,
        RuleVerdict::NeedsExternalJudgment { .. } => Classification::Unknown,
    };
    apply_overrides(raw, features)
}
