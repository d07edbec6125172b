//! Domain identifiers (strongly-typed IDs).
//!
//! Platform identifiers (`Spaces-1`, `Deployments-42`, `Interruptions-7`) are
//! opaque strings owned by the deployment platform. They share one generic
//! implementation, `PlatformId<T>`, where `T` is a zero-sized marker type so
//! a `SpaceId` can never be passed where a `DocumentId` is expected.
//!
//! Channel messages are identified by a ULID we generate ourselves
//! (`MessageId`), so they sort by send time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each platform id kind.
pub trait IdMarker: Send + Sync + 'static {
    /// Human-readable kind, used in error messages ("space", "document", ...).
    fn kind() -> &'static str;
}

/// Generic platform identifier.
///
/// `T` lives in `PhantomData` only; it costs nothing at runtime.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformId<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> PlatformId<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> &'static str {
        T::kind()
    }
}

// derive だと T: Clone などが要求されてしまうので手で実装する
impl<T: IdMarker> Clone for PlatformId<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: IdMarker> PartialEq for PlatformId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: IdMarker> Eq for PlatformId<T> {}

impl<T: IdMarker> std::hash::Hash for PlatformId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: IdMarker> From<&str> for PlatformId<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for PlatformId<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for PlatformId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {}

impl IdMarker for Space {
    fn kind() -> &'static str {
        "space"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {}

impl IdMarker for Document {
    fn kind() -> &'static str {
        "document"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interruption {}

impl IdMarker for Interruption {
    fn kind() -> &'static str {
        "interruption"
    }
}

/// Identifier of a platform space (tenant partition).
pub type SpaceId = PlatformId<Space>;

/// Identifier of the document (deployment, server task, ...) an event or
/// interruption is "regarding".
pub type DocumentId = PlatformId<Document>;

/// Identifier of a pending interruption.
pub type InterruptionId = PlatformId<Interruption>;

/// Identifier of a message on the decision channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Ulid);

impl MessageId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for MessageId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}
