//! Retry loop breaker.
//!
//! A guided-failure step that keeps failing, paired with an automation that
//! always answers "Retry", would loop forever. Each pause raises a
//! `GuidedFailureInterruptionRaised` event regarding the deployment, so the
//! number of such events is the number of times we have been asked already.
//! Once it exceeds the threshold a requested Retry is turned into Fail.

use tracing::{debug, warn};

use super::context::DeploymentContext;
use crate::domain::{
    DecisionAction, DecisionRequest, EffectiveDecision, InterlockError, RetryThreshold,
};

/// Pure decision rule: `Fail` iff `guided_failures > threshold` and the
/// requested action is `Retry`; otherwise the requested action unchanged.
pub fn break_retry_loop(
    requested: DecisionAction,
    guided_failures: usize,
    threshold: RetryThreshold,
) -> DecisionAction {
    let exceeded = guided_failures > threshold.value() as usize;
    if exceeded && requested == DecisionAction::Retry {
        DecisionAction::Fail
    } else {
        requested
    }
}

/// Read-only stage: counts events and computes the effective decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryLoopBreaker;

impl RetryLoopBreaker {
    pub fn new() -> Self {
        Self
    }

    pub async fn evaluate(
        &self,
        ctx: &DeploymentContext,
        request: &DecisionRequest,
    ) -> Result<EffectiveDecision, InterlockError> {
        // 数値として読めない場合は既定値に落とさずエラーにする
        let threshold = RetryThreshold::parse(Some(&request.maximum_retry))?;

        let events = ctx
            .repository
            .list_events_regarding(&ctx.document_id)
            .await?;
        let guided_failures = events.iter().filter(|e| e.is_guided_failure()).count();

        let action = break_retry_loop(request.action, guided_failures, threshold);
        let overridden = action != request.action;
        if overridden {
            warn!(
                document_id = %ctx.document_id,
                guided_failures,
                threshold = threshold.value(),
                "guided failure raised more than {threshold} time(s); changing Retry to Fail to break the loop"
            );
        } else {
            debug!(
                document_id = %ctx.document_id,
                guided_failures,
                threshold = threshold.value(),
                action = %action,
                "requested action kept"
            );
        }

        Ok(EffectiveDecision {
            document_id: ctx.document_id.clone(),
            interruption_type: request.interruption_type,
            action,
            overridden,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::domain::{
        DocumentId, GUIDED_FAILURE_INTERRUPTION_RAISED, InterruptionType, PlatformEvent, SpaceId,
    };
    use crate::impls::{CallKind, InMemoryPlatform};
    use crate::ports::DeploymentPlatform;

    #[rstest]
    #[case(DecisionAction::Retry, 0, 1, DecisionAction::Retry)]
    #[case(DecisionAction::Retry, 1, 1, DecisionAction::Retry)]
    #[case(DecisionAction::Retry, 2, 1, DecisionAction::Fail)]
    #[case(DecisionAction::Retry, 2, 3, DecisionAction::Retry)]
    #[case(DecisionAction::Retry, 1, 0, DecisionAction::Fail)]
    #[case(DecisionAction::Fail, 9, 1, DecisionAction::Fail)]
    #[case(DecisionAction::Ignore, 9, 1, DecisionAction::Ignore)]
    #[case(DecisionAction::Proceed, 9, 0, DecisionAction::Proceed)]
    fn decision_table(
        #[case] requested: DecisionAction,
        #[case] count: usize,
        #[case] threshold: u32,
        #[case] expected: DecisionAction,
    ) {
        assert_eq!(
            break_retry_loop(requested, count, RetryThreshold::new(threshold)),
            expected
        );
    }

    fn any_action() -> impl Strategy<Value = DecisionAction> {
        prop::sample::select(DecisionAction::ALL.to_vec())
    }

    proptest! {
        /// At or under the threshold the requested action always passes through.
        #[test]
        fn under_threshold_keeps_requested(action in any_action(), t in 0u32..1000, below in 0u32..1000) {
            let count = below.min(t) as usize;
            prop_assert_eq!(break_retry_loop(action, count, RetryThreshold::new(t)), action);
        }

        /// Over the threshold only Retry changes, and it becomes Fail.
        #[test]
        fn over_threshold_only_retry_flips(action in any_action(), t in 0u32..1000, extra in 1usize..1000) {
            let count = t as usize + extra;
            let effective = break_retry_loop(action, count, RetryThreshold::new(t));
            if action == DecisionAction::Retry {
                prop_assert_eq!(effective, DecisionAction::Fail);
            } else {
                prop_assert_eq!(effective, action);
            }
        }
    }

    async fn context_with_events(categories: &[&str]) -> (InMemoryPlatform, DeploymentContext) {
        let space = SpaceId::new("Spaces-1");
        let doc = DocumentId::new("Deployments-1");
        let platform = InMemoryPlatform::new();
        platform.add_space(space.clone()).await;
        for category in categories {
            platform
                .add_event(&space, PlatformEvent::new(*category, doc.clone()))
                .await;
        }
        // an event regarding another document must not count
        platform
            .add_event(
                &space,
                PlatformEvent::new(GUIDED_FAILURE_INTERRUPTION_RAISED, DocumentId::new("Deployments-2")),
            )
            .await;

        let repository = platform.resolve_space(&space).await.unwrap();
        (
            platform,
            DeploymentContext {
                repository,
                document_id: doc,
            },
        )
    }

    fn request(action: DecisionAction, maximum_retry: &str) -> DecisionRequest {
        DecisionRequest {
            interruption_type: InterruptionType::GuidedFailure,
            action,
            maximum_retry: maximum_retry.to_string(),
            raw_payload: Vec::new(),
        }
    }

    #[tokio::test]
    async fn counts_only_guided_failure_events_for_the_document() {
        let (_platform, ctx) = context_with_events(&[
            GUIDED_FAILURE_INTERRUPTION_RAISED,
            "DeploymentStarted",
            GUIDED_FAILURE_INTERRUPTION_RAISED,
        ])
        .await;

        let decision = RetryLoopBreaker::new()
            .evaluate(&ctx, &request(DecisionAction::Retry, "1"))
            .await
            .unwrap();
        assert_eq!(decision.action, DecisionAction::Fail);
        assert!(decision.overridden);
        assert_eq!(decision.form_key(), "GuidedFailure");

        let decision = RetryLoopBreaker::new()
            .evaluate(&ctx, &request(DecisionAction::Retry, "2"))
            .await
            .unwrap();
        assert_eq!(decision.action, DecisionAction::Retry);
        assert!(!decision.overridden);
    }

    #[tokio::test]
    async fn blank_maximum_retry_uses_the_default_of_one() {
        let (_platform, ctx) =
            context_with_events(&[GUIDED_FAILURE_INTERRUPTION_RAISED, GUIDED_FAILURE_INTERRUPTION_RAISED]).await;
        let decision = RetryLoopBreaker::new()
            .evaluate(&ctx, &request(DecisionAction::Retry, "  "))
            .await
            .unwrap();
        assert_eq!(decision.action, DecisionAction::Fail);
    }

    #[tokio::test]
    async fn non_numeric_threshold_fails_before_reading_events() {
        let (platform, ctx) = context_with_events(&[]).await;
        let err = RetryLoopBreaker::new()
            .evaluate(&ctx, &request(DecisionAction::Retry, "three"))
            .await
            .unwrap_err();
        assert!(matches!(err, InterlockError::ThresholdParse { .. }));
        assert_eq!(platform.count_calls(CallKind::ListEvents).await, 0);
    }

    #[tokio::test]
    async fn event_listing_failure_propagates() {
        let (platform, ctx) = context_with_events(&[]).await;
        platform.fail_next(CallKind::ListEvents, "gateway timeout").await;
        let err = RetryLoopBreaker::new()
            .evaluate(&ctx, &request(DecisionAction::Retry, "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, InterlockError::TransientApi(_)));
    }

    #[tokio::test]
    async fn breaker_never_writes() {
        let (platform, ctx) = context_with_events(&[GUIDED_FAILURE_INTERRUPTION_RAISED; 5]).await;
        RetryLoopBreaker::new()
            .evaluate(&ctx, &request(DecisionAction::Retry, "1"))
            .await
            .unwrap();
        assert_eq!(platform.write_calls().await, 0);
    }
}
