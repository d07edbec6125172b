//! The deployment event embedded in a decision request.
//!
//! The body is the platform's subscription webhook payload:
//!
//! ```json
//! { "Payload": { "Event": { "SpaceId": "Spaces-1",
//!                           "RelatedDocumentIds": ["Deployments-1", "..."],
//!                           "Category": "GuidedFailureInterruptionRaised" } } }
//! ```
//!
//! Only `SpaceId` and `RelatedDocumentIds` are required. Other fields are kept
//! when present for logging.

use serde::Deserialize;

use super::errors::InterlockError;
use super::ids::{DocumentId, SpaceId};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubscriptionEnvelope {
    payload: Option<SubscriptionPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubscriptionPayload {
    event: Option<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEvent {
    id: Option<String>,
    category: Option<String>,
    space_id: Option<String>,
    related_document_ids: Option<Vec<String>>,
}

/// Validated deployment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentEvent {
    pub event_id: Option<String>,
    pub category: Option<String>,
    pub space_id: SpaceId,
    /// Never empty; the first entry is the target document.
    pub related_document_ids: Vec<DocumentId>,
}

impl DeploymentEvent {
    pub fn parse(raw: &[u8]) -> Result<Self, InterlockError> {
        let envelope: SubscriptionEnvelope = serde_json::from_slice(raw)
            .map_err(|e| InterlockError::Parse(format!("invalid JSON: {e}")))?;

        let event = envelope
            .payload
            .ok_or_else(|| InterlockError::Parse("missing Payload".to_string()))?
            .event
            .ok_or_else(|| InterlockError::Parse("missing Payload.Event".to_string()))?;

        let space_id = event
            .space_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| InterlockError::Parse("missing Payload.Event.SpaceId".to_string()))?;

        let related = event.related_document_ids.ok_or_else(|| {
            InterlockError::Parse("missing Payload.Event.RelatedDocumentIds".to_string())
        })?;
        match related.first() {
            None => {
                return Err(InterlockError::Parse(
                    "Payload.Event.RelatedDocumentIds is empty".to_string(),
                ));
            }
            Some(target) if target.trim().is_empty() => {
                return Err(InterlockError::Parse(
                    "Payload.Event.RelatedDocumentIds[0] is blank".to_string(),
                ));
            }
            Some(_) => {}
        }

        Ok(Self {
            event_id: event.id,
            category: event.category,
            space_id: SpaceId::new(space_id),
            related_document_ids: related.into_iter().map(DocumentId::new).collect(),
        })
    }

    /// The document every decision targets. Remaining related ids are ignored.
    pub fn target_document(&self) -> &DocumentId {
        // parse() guarantees at least one entry
        &self.related_document_ids[0]
    }
}
