//! DeploymentPlatform port - the platform API the pipeline reads and writes.
//!
//! The platform is the source of truth for interruptions and events. Nothing
//! behind these traits is cached between deliveries.
//!
//! # 実装
//! - `impls::OctopusClient`: HTTP (reqwest)
//! - `impls::InMemoryPlatform`: 開発用・テスト用（呼び出しを記録する）

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    DocumentId, InterlockError, InterruptionId, InterruptionRecord, PlatformEvent, SpaceId,
};

/// Entry point: turns a space id into a space-scoped repository.
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    /// Fails with `NotFound` when the space does not exist.
    async fn resolve_space(
        &self,
        space_id: &SpaceId,
    ) -> Result<Arc<dyn SpaceRepository>, InterlockError>;
}

/// Operations scoped to one space.
#[async_trait]
pub trait SpaceRepository: Send + Sync {
    fn space_id(&self) -> &SpaceId;

    /// All events regarding the document, in platform order (every page).
    async fn list_events_regarding(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<PlatformEvent>, InterlockError>;

    /// Pending interruptions regarding the document, in platform order.
    async fn list_pending_interruptions(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<InterruptionRecord>, InterlockError>;

    /// Fresh read of one interruption (used for the pending re-check).
    async fn get_interruption(
        &self,
        interruption_id: &InterruptionId,
    ) -> Result<InterruptionRecord, InterlockError>;

    /// Claim responsibility. `ClaimConflict` when another actor holds it.
    async fn take_responsibility(
        &self,
        interruption_id: &InterruptionId,
    ) -> Result<(), InterlockError>;

    /// Submit the interruption's form values.
    async fn submit(&self, interruption: &InterruptionRecord) -> Result<(), InterlockError>;
}
