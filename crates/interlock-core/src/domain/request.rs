//! Decision requests and the channel message that carries them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::{DecisionAction, InterruptionType};
use super::errors::InterlockError;
use super::ids::MessageId;

/// Metadata attribute names on a channel message.
pub const ATTR_TYPE: &str = "Type";
pub const ATTR_ACTION: &str = "Action";
pub const ATTR_MAXIMUM_RETRY: &str = "MaximumRetry";

/// Value used when `MaximumRetry` was not supplied.
pub const DEFAULT_MAXIMUM_RETRY: &str = "1";

/// String key/value metadata attached to a channel message.
pub type MessageAttributes = BTreeMap<String, String>;

/// What the producer puts on the decision channel: opaque body + attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub body: Vec<u8>,
    pub attributes: MessageAttributes,
}

impl ChannelMessage {
    pub fn new(body: impl Into<Vec<u8>>, attributes: MessageAttributes) -> Self {
        Self {
            body: body.into(),
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A message as handed to a consumer: the original message plus delivery info.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: MessageId,
    pub message: ChannelMessage,
    /// 1 on first delivery, incremented on every redelivery.
    pub receive_count: u32,
    pub sent_at: DateTime<Utc>,
}

/// A validated decision request, rebuilt from a delivered message.
///
/// `maximum_retry` stays a raw string here; turning it into a number is the
/// loop breaker's job, so a bad value fails there with its own error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    pub interruption_type: InterruptionType,
    pub action: DecisionAction,
    pub maximum_retry: String,
    pub raw_payload: Vec<u8>,
}

impl DecisionRequest {
    pub fn from_message(message: &ChannelMessage) -> Result<Self, InterlockError> {
        if message.attributes.is_empty() {
            return Err(InterlockError::Attribute(
                "message carries no attributes; was the request sent without type/action parameters?"
                    .to_string(),
            ));
        }

        let interruption_type = required_attribute(message, ATTR_TYPE)?
            .parse::<InterruptionType>()
            .map_err(InterlockError::Attribute)?;
        let action = required_attribute(message, ATTR_ACTION)?
            .parse::<DecisionAction>()
            .map_err(InterlockError::Attribute)?;
        let maximum_retry = message
            .attribute(ATTR_MAXIMUM_RETRY)
            .unwrap_or(DEFAULT_MAXIMUM_RETRY)
            .to_string();

        Ok(Self {
            interruption_type,
            action,
            maximum_retry,
            raw_payload: message.body.clone(),
        })
    }

    /// Build the channel message for this request.
    pub fn to_message(&self) -> ChannelMessage {
        let mut attributes = MessageAttributes::new();
        attributes.insert(ATTR_TYPE.to_string(), self.interruption_type.to_string());
        attributes.insert(ATTR_ACTION.to_string(), self.action.to_string());
        attributes.insert(ATTR_MAXIMUM_RETRY.to_string(), self.maximum_retry.clone());
        ChannelMessage::new(self.raw_payload.clone(), attributes)
    }
}

fn required_attribute<'a>(
    message: &'a ChannelMessage,
    name: &str,
) -> Result<&'a str, InterlockError> {
    message
        .attribute(name)
        .ok_or_else(|| InterlockError::Attribute(format!("missing required attribute {name}")))
}
