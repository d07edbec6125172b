//! Delivery state machine for a channel message.

use serde::{Deserialize, Serialize};

/// Delivery state.
///
/// State transitions:
/// - Queued -> InFlight -> Acknowledged
/// - Queued -> InFlight -> RedeliveryScheduled -> Queued (until max receives)
/// - Queued -> InFlight -> DeadLettered (receive limit reached)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Ready to be received.
    Queued,

    /// Leased by a consumer, waiting for ack/fail.
    InFlight,

    /// Processed successfully and removed from circulation.
    Acknowledged,

    /// Failed; waiting out the backoff before the next receive.
    RedeliveryScheduled,

    /// Moved aside after too many failed receives.
    DeadLettered,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Acknowledged | DeliveryState::DeadLettered)
    }

    pub fn is_receivable(self) -> bool {
        matches!(self, DeliveryState::Queued)
    }
}
