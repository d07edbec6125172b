//! InMemoryPlatform - 開発用・テスト用のデプロイプラットフォーム
//!
//! Holds spaces, events and interruptions in memory and records every call
//! made against it, so tests can assert exactly which reads and writes the
//! pipeline performed. Failures and concurrent actors can be injected.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    DocumentId, InterlockError, InterruptionForm, InterruptionId, InterruptionRecord,
    PlatformEvent, SpaceId,
};
use crate::ports::{DeploymentPlatform, SpaceRepository};

/// Which platform operation a call was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    ResolveSpace,
    ListEvents,
    ListInterruptions,
    GetInterruption,
    TakeResponsibility,
    Submit,
}

impl CallKind {
    pub fn is_write(self) -> bool {
        matches!(self, CallKind::TakeResponsibility | CallKind::Submit)
    }
}

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    ResolveSpace(SpaceId),
    ListEvents(DocumentId),
    ListInterruptions(DocumentId),
    GetInterruption(InterruptionId),
    TakeResponsibility(InterruptionId),
    Submit {
        interruption_id: InterruptionId,
        form: InterruptionForm,
    },
}

impl PlatformCall {
    pub fn kind(&self) -> CallKind {
        match self {
            PlatformCall::ResolveSpace(_) => CallKind::ResolveSpace,
            PlatformCall::ListEvents(_) => CallKind::ListEvents,
            PlatformCall::ListInterruptions(_) => CallKind::ListInterruptions,
            PlatformCall::GetInterruption(_) => CallKind::GetInterruption,
            PlatformCall::TakeResponsibility(_) => CallKind::TakeResponsibility,
            PlatformCall::Submit { .. } => CallKind::Submit,
        }
    }
}

#[derive(Default)]
struct SpaceState {
    events: Vec<PlatformEvent>,
    interruptions: Vec<InterruptionRecord>,
}

impl SpaceState {
    fn interruption_mut(&mut self, id: &InterruptionId) -> Option<&mut InterruptionRecord> {
        self.interruptions.iter_mut().find(|i| &i.id == id)
    }
}

#[derive(Default)]
struct PlatformState {
    spaces: HashMap<SpaceId, SpaceState>,
    calls: Vec<PlatformCall>,
    /// Next call of this kind fails with `TransientApi(message)`.
    failures: HashMap<CallKind, String>,
    /// Resolved by "someone else" right after the next interruption listing.
    resolve_after_listing: HashSet<InterruptionId>,
}

impl PlatformState {
    fn record(&mut self, call: PlatformCall) -> Result<(), InterlockError> {
        let kind = call.kind();
        self.calls.push(call);
        match self.failures.remove(&kind) {
            Some(message) => Err(InterlockError::TransientApi(message)),
            None => Ok(()),
        }
    }

    fn space_mut(&mut self, space_id: &SpaceId) -> Result<&mut SpaceState, InterlockError> {
        self.spaces
            .get_mut(space_id)
            .ok_or_else(|| InterlockError::not_found("space", space_id.as_str()))
    }
}

/// In-memory platform. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct InMemoryPlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_space(&self, space_id: SpaceId) {
        let mut state = self.state.lock().await;
        state.spaces.entry(space_id).or_default();
    }

    /// Append an event (creates the space if needed).
    pub async fn add_event(&self, space_id: &SpaceId, event: PlatformEvent) {
        let mut state = self.state.lock().await;
        state
            .spaces
            .entry(space_id.clone())
            .or_default()
            .events
            .push(event);
    }

    /// Append an interruption (creates the space if needed).
    pub async fn add_interruption(&self, space_id: &SpaceId, interruption: InterruptionRecord) {
        let mut state = self.state.lock().await;
        state
            .spaces
            .entry(space_id.clone())
            .or_default()
            .interruptions
            .push(interruption);
    }

    /// Simulate another user holding responsibility for an interruption.
    pub async fn claim_by_other(&self, space_id: &SpaceId, id: &InterruptionId, user: &str) {
        let mut state = self.state.lock().await;
        if let Ok(space) = state.space_mut(space_id)
            && let Some(rec) = space.interruption_mut(id)
        {
            rec.can_take_responsibility = false;
            rec.has_responsibility = false;
            rec.responsible_user_id = Some(user.to_string());
        }
    }

    /// Simulate a concurrent delivery resolving `id` just after we listed it.
    pub async fn resolve_after_next_listing(&self, id: InterruptionId) {
        let mut state = self.state.lock().await;
        state.resolve_after_listing.insert(id);
    }

    /// Make the next call of `kind` fail with a transient error.
    pub async fn fail_next(&self, kind: CallKind, message: &str) {
        let mut state = self.state.lock().await;
        state.failures.insert(kind, message.to_string());
    }

    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn count_calls(&self, kind: CallKind) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    pub async fn write_calls(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.kind().is_write())
            .count()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn interruption(
        &self,
        space_id: &SpaceId,
        id: &InterruptionId,
    ) -> Option<InterruptionRecord> {
        let state = self.state.lock().await;
        state
            .spaces
            .get(space_id)?
            .interruptions
            .iter()
            .find(|i| &i.id == id)
            .cloned()
    }
}

#[async_trait]
impl DeploymentPlatform for InMemoryPlatform {
    async fn resolve_space(
        &self,
        space_id: &SpaceId,
    ) -> Result<Arc<dyn SpaceRepository>, InterlockError> {
        let mut state = self.state.lock().await;
        state.record(PlatformCall::ResolveSpace(space_id.clone()))?;
        if !state.spaces.contains_key(space_id) {
            return Err(InterlockError::not_found("space", space_id.as_str()));
        }
        Ok(Arc::new(InMemorySpace {
            space_id: space_id.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct InMemorySpace {
    space_id: SpaceId,
    state: Arc<Mutex<PlatformState>>,
}

#[async_trait]
impl SpaceRepository for InMemorySpace {
    fn space_id(&self) -> &SpaceId {
        &self.space_id
    }

    async fn list_events_regarding(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<PlatformEvent>, InterlockError> {
        let mut state = self.state.lock().await;
        state.record(PlatformCall::ListEvents(document_id.clone()))?;
        let space = state.space_mut(&self.space_id)?;
        Ok(space
            .events
            .iter()
            .filter(|e| e.related_document_ids.contains(document_id))
            .cloned()
            .collect())
    }

    async fn list_pending_interruptions(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<InterruptionRecord>, InterlockError> {
        let mut state = self.state.lock().await;
        state.record(PlatformCall::ListInterruptions(document_id.clone()))?;
        let resolve_later = std::mem::take(&mut state.resolve_after_listing);
        let space = state.space_mut(&self.space_id)?;
        let listed: Vec<InterruptionRecord> = space
            .interruptions
            .iter()
            .filter(|i| i.is_pending && i.is_regarding(document_id))
            .cloned()
            .collect();

        for id in &resolve_later {
            if let Some(rec) = space.interruption_mut(id) {
                rec.is_pending = false;
            }
        }
        Ok(listed)
    }

    async fn get_interruption(
        &self,
        interruption_id: &InterruptionId,
    ) -> Result<InterruptionRecord, InterlockError> {
        let mut state = self.state.lock().await;
        state.record(PlatformCall::GetInterruption(interruption_id.clone()))?;
        let space = state.space_mut(&self.space_id)?;
        space
            .interruption_mut(interruption_id)
            .map(|rec| rec.clone())
            .ok_or_else(|| InterlockError::not_found("interruption", interruption_id.as_str()))
    }

    async fn take_responsibility(
        &self,
        interruption_id: &InterruptionId,
    ) -> Result<(), InterlockError> {
        let mut state = self.state.lock().await;
        state.record(PlatformCall::TakeResponsibility(interruption_id.clone()))?;
        let space = state.space_mut(&self.space_id)?;
        let rec = space
            .interruption_mut(interruption_id)
            .ok_or_else(|| InterlockError::not_found("interruption", interruption_id.as_str()))?;
        if !rec.is_claimable() {
            return Err(InterlockError::ClaimConflict {
                interruption_id: interruption_id.to_string(),
            });
        }
        rec.has_responsibility = true;
        rec.responsible_user_id = None;
        Ok(())
    }

    async fn submit(&self, interruption: &InterruptionRecord) -> Result<(), InterlockError> {
        let mut state = self.state.lock().await;
        state.record(PlatformCall::Submit {
            interruption_id: interruption.id.clone(),
            form: interruption.form.clone(),
        })?;
        let space = state.space_mut(&self.space_id)?;
        let rec = space
            .interruption_mut(&interruption.id)
            .ok_or_else(|| InterlockError::not_found("interruption", interruption.id.as_str()))?;
        if !rec.is_pending {
            return Err(InterlockError::TransientApi(format!(
                "{} is no longer pending",
                interruption.id
            )));
        }
        if !rec.has_responsibility {
            return Err(InterlockError::ClaimConflict {
                interruption_id: interruption.id.to_string(),
            });
        }
        rec.form = interruption.form.clone();
        rec.is_pending = false;
        Ok(())
    }
}
