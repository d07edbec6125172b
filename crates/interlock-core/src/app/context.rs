//! Deployment context resolution: event → (space repository, target document).

use std::sync::Arc;

use tracing::debug;

use crate::domain::{DeploymentEvent, DocumentId, InterlockError};
use crate::ports::{DeploymentPlatform, SpaceRepository};

/// Everything the later stages need to talk to the platform about one document.
#[derive(Clone)]
pub struct DeploymentContext {
    pub repository: Arc<dyn SpaceRepository>,
    pub document_id: DocumentId,
}

impl std::fmt::Debug for DeploymentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentContext")
            .field("space_id", self.repository.space_id())
            .field("document_id", &self.document_id)
            .finish()
    }
}

pub struct ContextResolver {
    platform: Arc<dyn DeploymentPlatform>,
}

impl ContextResolver {
    pub fn new(platform: Arc<dyn DeploymentPlatform>) -> Self {
        Self { platform }
    }

    /// Resolve the space and pick the first related document.
    ///
    /// Only `RelatedDocumentIds[0]` is ever used; the rest are ignored.
    pub async fn resolve(
        &self,
        event: &DeploymentEvent,
    ) -> Result<DeploymentContext, InterlockError> {
        let repository = self.platform.resolve_space(&event.space_id).await?;
        let document_id = event.target_document().clone();
        debug!(
            space_id = %event.space_id,
            document_id = %document_id,
            ignored_documents = event.related_document_ids.len() - 1,
            "resolved deployment context"
        );
        Ok(DeploymentContext {
            repository,
            document_id,
        })
    }
}
