//! Interruption resolver: claim + submit every pending interruption of a
//! deployment with the effective decision.
//!
//! 冪等性が前提。同じメッセージが二度届いても、処理直前に pending を
//! 取り直すので二重 submit にはならない。

use tracing::{info, warn};

use super::context::DeploymentContext;
use crate::domain::{EffectiveDecision, InterlockError, InterruptionId, InterruptionRecord};

/// What one pass did, per interruption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub submitted: Vec<InterruptionId>,
    /// Listed as pending but already resolved when we got to it.
    pub skipped_not_pending: Vec<InterruptionId>,
    /// Someone else holds responsibility.
    pub skipped_conflict: Vec<InterruptionId>,
}

impl ResolutionReport {
    pub fn is_noop(&self) -> bool {
        self.submitted.is_empty()
    }

    pub fn touched(&self) -> usize {
        self.submitted.len() + self.skipped_not_pending.len() + self.skipped_conflict.len()
    }
}

enum Step {
    Submitted,
    NotPending,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InterruptionResolver;

impl InterruptionResolver {
    pub fn new() -> Self {
        Self
    }

    pub async fn resolve(
        &self,
        ctx: &DeploymentContext,
        decision: &EffectiveDecision,
    ) -> Result<ResolutionReport, InterlockError> {
        let pending = ctx
            .repository
            .list_pending_interruptions(&ctx.document_id)
            .await?;

        let mut report = ResolutionReport::default();
        if pending.is_empty() {
            info!(document_id = %ctx.document_id, "no pending interruptions");
            return Ok(report);
        }

        // プラットフォームが返した順に処理する
        for listed in pending {
            let id = listed.id.clone();
            match self.resolve_one(ctx, &listed, decision).await {
                Ok(Step::Submitted) => report.submitted.push(id),
                Ok(Step::NotPending) => report.skipped_not_pending.push(id),
                Err(e) if e.is_recoverable() => {
                    warn!(interruption_id = %id, error = %e, "skipping interruption");
                    report.skipped_conflict.push(id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Claim and submit a single interruption. Claim + submit is one unit:
    /// if the claim fails nothing is submitted.
    async fn resolve_one(
        &self,
        ctx: &DeploymentContext,
        listed: &InterruptionRecord,
        decision: &EffectiveDecision,
    ) -> Result<Step, InterlockError> {
        let mut current = ctx.repository.get_interruption(&listed.id).await?;
        if !current.is_pending {
            info!(interruption_id = %current.id, "interruption already resolved");
            return Ok(Step::NotPending);
        }
        if !current.is_claimable() {
            return Err(InterlockError::ClaimConflict {
                interruption_id: current.id.to_string(),
            });
        }

        if let Err(e) = ctx.repository.take_responsibility(&current.id).await {
            return self.settle_failure(ctx, &current.id, e).await;
        }
        info!(interruption_id = %current.id, "took responsibility");

        current.form.set(decision.form_key(), decision.action.as_str());
        if let Err(e) = ctx.repository.submit(&current).await {
            return self.settle_failure(ctx, &current.id, e).await;
        }
        info!(
            interruption_id = %current.id,
            field = decision.form_key(),
            action = %decision.action,
            overridden = decision.overridden,
            "submitted interruption"
        );
        Ok(Step::Submitted)
    }

    /// A claim or submit failed. If a concurrent delivery resolved the
    /// interruption in the meantime the failure is moot; otherwise it stands.
    async fn settle_failure(
        &self,
        ctx: &DeploymentContext,
        id: &InterruptionId,
        error: InterlockError,
    ) -> Result<Step, InterlockError> {
        if error.is_recoverable() {
            return Err(error);
        }
        match ctx.repository.get_interruption(id).await {
            Ok(current) if !current.is_pending => {
                info!(
                    interruption_id = %id,
                    error = %error,
                    "interruption resolved concurrently"
                );
                Ok(Step::NotPending)
            }
            // 再取得に失敗した場合も元のエラーを返す
            _ => Err(error),
        }
    }
}
