//! Decision model: which interruption kind is being answered, and with what.
//!
//! `InterruptionType` and `DecisionAction` are closed sets. Anything the
//! platform's form would not understand is rejected at the channel boundary
//! instead of being written into an interruption form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::InterlockError;
use super::ids::DocumentId;

/// The kind of pause the decision answers. Its name doubles as the form key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterruptionType {
    ManualIntervention,
    GuidedFailure,
}

impl InterruptionType {
    pub const ALL: [InterruptionType; 2] = [
        InterruptionType::ManualIntervention,
        InterruptionType::GuidedFailure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InterruptionType::ManualIntervention => "ManualIntervention",
            InterruptionType::GuidedFailure => "GuidedFailure",
        }
    }
}

impl fmt::Display for InterruptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterruptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown interruption type {s:?}"))
    }
}

/// The answer submitted into the interruption form.
///
/// Guided failure understands Retry/Fail/Ignore/Exclude, manual intervention
/// understands Proceed/Abort. The pairing is not enforced here; the platform
/// owns that rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionAction {
    Retry,
    Fail,
    Ignore,
    Exclude,
    Proceed,
    Abort,
}

impl DecisionAction {
    pub const ALL: [DecisionAction; 6] = [
        DecisionAction::Retry,
        DecisionAction::Fail,
        DecisionAction::Ignore,
        DecisionAction::Exclude,
        DecisionAction::Proceed,
        DecisionAction::Abort,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DecisionAction::Retry => "Retry",
            DecisionAction::Fail => "Fail",
            DecisionAction::Ignore => "Ignore",
            DecisionAction::Exclude => "Exclude",
            DecisionAction::Proceed => "Proceed",
            DecisionAction::Abort => "Abort",
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action {s:?}"))
    }
}

/// How many guided-failure events a document may accumulate before an
/// automated Retry is turned into a Fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RetryThreshold(u32);

impl RetryThreshold {
    pub const DEFAULT: RetryThreshold = RetryThreshold(1);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Parse the raw `MaximumRetry` attribute.
    ///
    /// Missing, empty or whitespace-only means the default. Anything else must
    /// be a non-negative integer; garbage is an error, never the default.
    pub fn parse(raw: Option<&str>) -> Result<Self, InterlockError> {
        let Some(raw) = raw else {
            return Ok(Self::DEFAULT);
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::DEFAULT);
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|e| InterlockError::ThresholdParse {
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Default for RetryThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RetryThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The decision actually applied to every pending interruption of a document
/// in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveDecision {
    pub document_id: DocumentId,
    pub interruption_type: InterruptionType,
    pub action: DecisionAction,
    /// True when the loop breaker replaced the requested action.
    pub overridden: bool,
}

impl EffectiveDecision {
    /// The form key this decision is written under.
    pub fn form_key(&self) -> &'static str {
        self.interruption_type.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 1)]
    #[case(Some(""), 1)]
    #[case(Some("   "), 1)]
    #[case(Some("0"), 0)]
    #[case(Some("3"), 3)]
    #[case(Some(" 5 "), 5)]
    fn threshold_parses_or_defaults(#[case] raw: Option<&str>, #[case] expected: u32) {
        assert_eq!(RetryThreshold::parse(raw).unwrap().value(), expected);
    }

    #[rstest]
    #[case("abc")]
    #[case("1.5")]
    #[case("-1")]
    #[case("99999999999")]
    fn threshold_rejects_garbage_instead_of_defaulting(#[case] raw: &str) {
        let err = RetryThreshold::parse(Some(raw)).unwrap_err();
        assert!(
            matches!(err, InterlockError::ThresholdParse { ref value, .. } if value == raw),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn enums_parse_their_own_names() {
        for t in InterruptionType::ALL {
            assert_eq!(t.as_str().parse::<InterruptionType>().unwrap(), t);
        }
        for a in DecisionAction::ALL {
            assert_eq!(a.to_string().parse::<DecisionAction>().unwrap(), a);
        }
    }

    #[test]
    fn enums_are_case_sensitive_and_closed() {
        assert!("retry".parse::<DecisionAction>().is_err());
        assert!("Rollback".parse::<DecisionAction>().is_err());
        assert!("guidedfailure".parse::<InterruptionType>().is_err());
    }
}
