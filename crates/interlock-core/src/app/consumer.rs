//! Message consumer: one delivered message → one pipeline run.
//!
//! attributes → payload → context → loop breaker → resolver
//!
//! Attribute and payload validation happen before any platform call, so a
//! malformed message never causes a read or a write.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span};

use super::context::ContextResolver;
use super::loop_breaker::RetryLoopBreaker;
use super::resolver::{InterruptionResolver, ResolutionReport};
use crate::domain::{
    ChannelMessage, DecisionRequest, DeploymentEvent, EffectiveDecision, InterlockError,
};
use crate::ports::DeploymentPlatform;

/// Result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub decision: EffectiveDecision,
    pub report: ResolutionReport,
}

pub struct MessageConsumer {
    contexts: ContextResolver,
    breaker: RetryLoopBreaker,
    resolver: InterruptionResolver,
}

impl MessageConsumer {
    pub fn new(platform: Arc<dyn DeploymentPlatform>) -> Self {
        Self {
            contexts: ContextResolver::new(platform),
            breaker: RetryLoopBreaker::new(),
            resolver: InterruptionResolver::new(),
        }
    }

    /// Run the full pipeline for one message. The message is not modified.
    pub async fn process(
        &self,
        message: &ChannelMessage,
    ) -> Result<ProcessOutcome, InterlockError> {
        let request = DecisionRequest::from_message(message)?;
        let span = info_span!(
            "process_message",
            interruption_type = %request.interruption_type,
            action = %request.action,
            maximum_retry = %request.maximum_retry,
        );
        self.run(request).instrument(span).await
    }

    /// Process several messages strictly one after another.
    ///
    /// Each message gets its own result; a failure does not stop the batch.
    pub async fn process_batch(
        &self,
        messages: &[ChannelMessage],
    ) -> Vec<Result<ProcessOutcome, InterlockError>> {
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            results.push(self.process(message).await);
        }
        results
    }

    async fn run(&self, request: DecisionRequest) -> Result<ProcessOutcome, InterlockError> {
        info!("received decision request");

        let event = DeploymentEvent::parse(&request.raw_payload)?;
        debug!(
            space_id = %event.space_id,
            document_id = %event.target_document(),
            "parsed deployment event"
        );

        let ctx = self.contexts.resolve(&event).await?;
        info!(space_id = %event.space_id, document_id = %ctx.document_id, "space resolved");

        let decision = self.breaker.evaluate(&ctx, &request).await?;
        let report = self.resolver.resolve(&ctx, &decision).await?;

        info!(
            action = %decision.action,
            overridden = decision.overridden,
            submitted = report.submitted.len(),
            skipped = report.touched() - report.submitted.len(),
            "decision request processed"
        );
        Ok(ProcessOutcome { decision, report })
    }
}
