//! Errors - エラー型と分類
//!
//! Every stage of the pipeline returns `InterlockError`. `ErrorKind` tells the
//! caller what to do with it: only a claim conflict is handled in place, every
//! other error is surfaced to the decision channel so it can redeliver or
//! dead-letter the message.

use thiserror::Error;

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Handled locally: skip the affected interruption and keep going.
    Recoverable,
    /// Redelivering the same message will fail the same way.
    Terminal,
    /// Network or platform hiccup; a redelivery may succeed.
    Transient,
}

#[derive(Debug, Error)]
pub enum InterlockError {
    /// Inbound request rejected before anything was enqueued.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Delivered message lacks (or carries an unusable) metadata attribute.
    #[error("message attribute error: {0}")]
    Attribute(String),

    /// Event payload is malformed or misses a required field.
    #[error("event payload parse error: {0}")]
    Parse(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// `MaximumRetry` is present but is not a non-negative integer.
    #[error("invalid MaximumRetry value {value:?}: {reason}")]
    ThresholdParse { value: String, reason: String },

    /// Another actor already holds responsibility for the interruption.
    #[error("responsibility for {interruption_id} is held by another actor")]
    ClaimConflict { interruption_id: String },

    #[error("platform API error: {0}")]
    TransientApi(String),

    #[error("decision channel error: {0}")]
    Channel(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl InterlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InterlockError::ClaimConflict { .. } => ErrorKind::Recoverable,
            InterlockError::TransientApi(_) | InterlockError::Channel(_) => ErrorKind::Transient,
            InterlockError::Validation(_)
            | InterlockError::Attribute(_)
            | InterlockError::Parse(_)
            | InterlockError::NotFound { .. }
            | InterlockError::ThresholdParse { .. }
            | InterlockError::Config(_) => ErrorKind::Terminal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Recoverable
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        InterlockError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<reqwest::Error> for InterlockError {
    fn from(err: reqwest::Error) -> Self {
        InterlockError::TransientApi(err.to_string())
    }
}

impl From<config::ConfigError> for InterlockError {
    fn from(err: config::ConfigError) -> Self {
        InterlockError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_claim_conflicts_are_recoverable() {
        let conflict = InterlockError::ClaimConflict {
            interruption_id: "Interruptions-1".to_string(),
        };
        assert!(conflict.is_recoverable());

        let others = [
            InterlockError::Validation("x".into()),
            InterlockError::Attribute("x".into()),
            InterlockError::Parse("x".into()),
            InterlockError::not_found("space", "Spaces-9"),
            InterlockError::ThresholdParse {
                value: "abc".into(),
                reason: "invalid digit".into(),
            },
            InterlockError::TransientApi("503".into()),
            InterlockError::Channel("closed".into()),
            InterlockError::Config("missing".into()),
        ];
        for err in others {
            assert!(!err.is_recoverable(), "{err} should not be recoverable");
        }
    }

    #[test]
    fn transient_errors_are_classified_for_redelivery() {
        assert_eq!(
            InterlockError::TransientApi("timeout".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            InterlockError::Parse("no SpaceId".into()).kind(),
            ErrorKind::Terminal
        );
    }

    #[test]
    fn not_found_message_names_the_kind() {
        let err = InterlockError::not_found("space", "Spaces-9");
        assert_eq!(err.to_string(), "space not found: Spaces-9");
    }
}
