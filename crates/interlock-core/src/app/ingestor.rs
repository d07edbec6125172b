//! Request ingestor: validates an inbound decision request and enqueues it.
//!
//! Stateless; safe to call concurrently. The body is forwarded as-is.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::channel::DecisionChannel;
use crate::domain::{
    DEFAULT_MAXIMUM_RETRY, DecisionAction, DecisionRequest, InterlockError, InterruptionType,
    MessageId,
};

pub const PARAM_TYPE: &str = "type";
pub const PARAM_ACTION: &str = "action";
pub const PARAM_MAXIMUM_RETRY: &str = "maximumretry";

/// Inbound query parameters. Names are case-sensitive.
pub type RequestParams = HashMap<String, String>;

pub struct RequestIngestor {
    channel: Arc<dyn DecisionChannel>,
}

impl RequestIngestor {
    pub fn new(channel: Arc<dyn DecisionChannel>) -> Self {
        Self { channel }
    }

    /// Validate `type`/`action`, default `maximumretry`, and enqueue.
    ///
    /// `maximumretry` is forwarded verbatim when present; the consumer owns
    /// the numeric check.
    pub async fn accept(
        &self,
        params: &RequestParams,
        body: impl Into<Vec<u8>>,
    ) -> Result<MessageId, InterlockError> {
        let request = validate(params, body.into()).inspect_err(|e| {
            warn!(error = %e, "rejected decision request");
        })?;

        let message_id = self
            .channel
            .send(request.to_message())
            .await
            .map_err(|e| InterlockError::Channel(format!("failed to enqueue: {e}")))?;

        info!(
            %message_id,
            interruption_type = %request.interruption_type,
            action = %request.action,
            maximum_retry = %request.maximum_retry,
            "decision request enqueued"
        );
        Ok(message_id)
    }
}

fn validate(params: &RequestParams, body: Vec<u8>) -> Result<DecisionRequest, InterlockError> {
    let interruption_type = required_param(params, PARAM_TYPE)?
        .parse::<InterruptionType>()
        .map_err(InterlockError::Validation)?;
    let action = required_param(params, PARAM_ACTION)?
        .parse::<DecisionAction>()
        .map_err(InterlockError::Validation)?;
    let maximum_retry = match params.get(PARAM_MAXIMUM_RETRY) {
        Some(v) if !v.is_empty() => v.clone(),
        _ => DEFAULT_MAXIMUM_RETRY.to_string(),
    };

    Ok(DecisionRequest {
        interruption_type,
        action,
        maximum_retry,
        raw_payload: body,
    })
}

fn required_param<'a>(params: &'a RequestParams, name: &str) -> Result<&'a str, InterlockError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| InterlockError::Validation(format!("missing query parameter {name}")))
}
