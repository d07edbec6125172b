//! Decision channel: the at-least-once port between producer and consumer,
//! plus an in-memory implementation with redelivery and dead-lettering.

mod memory;
mod record;
mod redelivery;
mod state;

pub use memory::InMemoryDecisionChannel;
pub use record::MessageRecord;
pub use redelivery::RedeliveryPolicy;
pub use state::DeliveryState;

use async_trait::async_trait;

use crate::domain::{ChannelMessage, Delivery, InterlockError, MessageId};
use crate::observability::ChannelCounts;

/// A received message. The consumer owns the lease and must either `ack` or
/// `fail` it.
///
/// - The channel owns delivery state (Queued -> InFlight -> ...).
/// - The consumer runs the pipeline and reports the result.
#[async_trait]
pub trait DeliveryLease: Send {
    fn delivery(&self) -> &Delivery;

    /// Processing succeeded; the message leaves the channel.
    async fn ack(self: Box<Self>) -> Result<(), InterlockError>;

    /// Processing failed; the channel decides between redelivery and dead-letter.
    async fn fail(self: Box<Self>, error: String) -> Result<(), InterlockError>;
}

/// Decision channel port.
#[async_trait]
pub trait DecisionChannel: Send + Sync {
    async fn send(&self, message: ChannelMessage) -> Result<MessageId, InterlockError>;

    /// Receive one message, waiting until one becomes visible.
    async fn lease(&self) -> Option<Box<dyn DeliveryLease>>;

    /// Receive one message if one is visible right now.
    async fn try_lease(&self) -> Option<Box<dyn DeliveryLease>>;

    async fn counts(&self) -> Result<ChannelCounts, InterlockError>;
}
