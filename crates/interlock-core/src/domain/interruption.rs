//! Interruption records and platform events, as the platform API returns them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DocumentId, InterruptionId};

/// Event category raised each time guided failure pauses a step.
pub const GUIDED_FAILURE_INTERRUPTION_RAISED: &str = "GuidedFailureInterruptionRaised";

/// The interruption's form: field name → submitted value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterruptionForm {
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
}

impl InterruptionForm {
    pub fn set(&mut self, field: &str, value: &str) {
        self.values
            .insert(field.to_string(), serde_json::Value::String(value.to_string()));
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(serde_json::Value::as_str)
    }
}

/// A pause point owned by the platform. We never keep one across deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterruptionRecord {
    pub id: InterruptionId,
    #[serde(default)]
    pub title: Option<String>,
    pub is_pending: bool,
    #[serde(default)]
    pub form: InterruptionForm,
    #[serde(default)]
    pub related_document_ids: Vec<DocumentId>,
    #[serde(default = "default_true")]
    pub can_take_responsibility: bool,
    #[serde(default)]
    pub has_responsibility: bool,
    #[serde(default)]
    pub responsible_user_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl InterruptionRecord {
    pub fn new(id: impl Into<InterruptionId>, document_id: DocumentId) -> Self {
        Self {
            id: id.into(),
            title: None,
            is_pending: true,
            form: InterruptionForm::default(),
            related_document_ids: vec![document_id],
            can_take_responsibility: true,
            has_responsibility: false,
            responsible_user_id: None,
        }
    }

    pub fn is_regarding(&self, document_id: &DocumentId) -> bool {
        self.related_document_ids.contains(document_id)
    }

    /// Whether our credential may claim (or already holds) responsibility.
    pub fn is_claimable(&self) -> bool {
        self.has_responsibility || self.can_take_responsibility
    }
}

/// One entry of the platform's audit event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlatformEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub category: String,
    #[serde(default)]
    pub occurred: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub related_document_ids: Vec<DocumentId>,
}

impl PlatformEvent {
    pub fn new(category: impl Into<String>, document_id: DocumentId) -> Self {
        Self {
            id: None,
            category: category.into(),
            occurred: None,
            message_text: None,
            related_document_ids: vec![document_id],
        }
    }

    pub fn is_guided_failure(&self) -> bool {
        self.category == GUIDED_FAILURE_INTERRUPTION_RAISED
    }
}
