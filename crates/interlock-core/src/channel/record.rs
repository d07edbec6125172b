//! Message record: delivery metadata + the message itself.

use std::time::Instant;

use chrono::{DateTime, Utc};

use super::DeliveryState;
use crate::domain::{ChannelMessage, Delivery, MessageId};

/// Single source of truth for one message inside the in-memory channel.
/// The ready/scheduled structures hold `MessageId`s only.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub message: ChannelMessage,
    pub state: DeliveryState,

    /// Times this message has been handed to a consumer.
    pub receive_count: u32,

    /// Last failure reported by a consumer.
    pub last_error: Option<String>,

    /// When the next receive may happen (RedeliveryScheduled only).
    pub next_visible_at: Option<Instant>,

    pub sent_at: DateTime<Utc>,
    pub updated_at: Instant,
}

impl MessageRecord {
    pub fn new(message_id: MessageId, message: ChannelMessage, sent_at: DateTime<Utc>) -> Self {
        Self {
            message_id,
            message,
            state: DeliveryState::Queued,
            receive_count: 0,
            last_error: None,
            next_visible_at: None,
            sent_at,
            updated_at: Instant::now(),
        }
    }

    /// Hand out to a consumer (increments receive_count).
    pub fn start_delivery(&mut self) -> Delivery {
        self.state = DeliveryState::InFlight;
        self.receive_count += 1;
        self.updated_at = Instant::now();
        Delivery {
            message_id: self.message_id,
            message: self.message.clone(),
            receive_count: self.receive_count,
            sent_at: self.sent_at,
        }
    }

    pub fn mark_acknowledged(&mut self) {
        self.state = DeliveryState::Acknowledged;
        self.updated_at = Instant::now();
    }

    pub fn mark_dead_lettered(&mut self, error: String) {
        self.state = DeliveryState::DeadLettered;
        self.last_error = Some(error);
        self.updated_at = Instant::now();
    }

    pub fn schedule_redelivery(&mut self, next_visible_at: Instant, error: String) {
        self.state = DeliveryState::RedeliveryScheduled;
        self.next_visible_at = Some(next_visible_at);
        self.last_error = Some(error);
        self.updated_at = Instant::now();
    }

    /// RedeliveryScheduled -> Queued.
    pub fn requeue(&mut self) {
        self.state = DeliveryState::Queued;
        self.next_visible_at = None;
        self.updated_at = Instant::now();
    }
}
