//! Domain model (IDs, decisions, requests, events, interruptions, errors).

pub mod decision;
pub mod errors;
pub mod event;
pub mod ids;
pub mod interruption;
pub mod request;

pub use decision::{DecisionAction, EffectiveDecision, InterruptionType, RetryThreshold};
pub use errors::{ErrorKind, InterlockError};
pub use event::DeploymentEvent;
pub use ids::{DocumentId, InterruptionId, MessageId, SpaceId};
pub use interruption::{
    GUIDED_FAILURE_INTERRUPTION_RAISED, InterruptionForm, InterruptionRecord, PlatformEvent,
};
pub use request::{
    ATTR_ACTION, ATTR_MAXIMUM_RETRY, ATTR_TYPE, ChannelMessage, DEFAULT_MAXIMUM_RETRY,
    DecisionRequest, Delivery, MessageAttributes,
};
