//! In-memory decision channel.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{DecisionChannel, DeliveryLease, DeliveryState, MessageRecord, RedeliveryPolicy};
use crate::domain::{ChannelMessage, Delivery, InterlockError, MessageId};
use crate::observability::ChannelCounts;
use crate::ports::{Clock, MessageIdGenerator, SystemClock, UlidGenerator};

/// Scheduled redelivery entry. Reverse ordering turns `BinaryHeap` into a
/// min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledRedelivery {
    next_visible_at: Instant,
    message_id: MessageId,
}

impl PartialOrd for ScheduledRedelivery {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledRedelivery {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_visible_at.cmp(&self.next_visible_at)
    }
}

struct ChannelState {
    records: HashMap<MessageId, MessageRecord>,
    ready: VecDeque<MessageId>,
    scheduled: BinaryHeap<ScheduledRedelivery>,
    policy: RedeliveryPolicy,
}

impl ChannelState {
    fn new(policy: RedeliveryPolicy) -> Self {
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
            policy,
        }
    }

    /// Move messages whose backoff elapsed back to the ready queue.
    fn promote_scheduled(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_visible_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.message_id)
                && record.state == DeliveryState::RedeliveryScheduled
            {
                record.requeue();
                self.ready.push_back(entry.message_id);
            }
        }
    }

    fn take_ready(&mut self) -> Option<Delivery> {
        self.promote_scheduled();
        while let Some(message_id) = self.ready.pop_front() {
            if let Some(record) = self.records.get_mut(&message_id)
                && record.state.is_receivable()
            {
                return Some(record.start_delivery());
            }
        }
        None
    }

    fn counts(&self) -> ChannelCounts {
        let mut counts = ChannelCounts::default();
        for record in self.records.values() {
            match record.state {
                DeliveryState::Queued => counts.queued += 1,
                DeliveryState::InFlight => counts.in_flight += 1,
                DeliveryState::Acknowledged => counts.acknowledged += 1,
                DeliveryState::RedeliveryScheduled => counts.redelivery_scheduled += 1,
                DeliveryState::DeadLettered => counts.dead_lettered += 1,
            }
        }
        counts
    }
}

/// In-memory, at-least-once decision channel with SQS-like redrive.
pub struct InMemoryDecisionChannel {
    state: Arc<Mutex<ChannelState>>,
    notify: Arc<Notify>,
    ids: Arc<dyn MessageIdGenerator>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDecisionChannel {
    pub fn new(policy: RedeliveryPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// `clock` drives both record timestamps and the ULID time part.
    pub fn with_clock(policy: RedeliveryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState::new(policy))),
            notify: Arc::new(Notify::new()),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
        }
    }

    /// Messages that exhausted their receives, with the last error seen.
    pub async fn dead_letters(&self) -> Vec<MessageRecord> {
        let state = self.state.lock().await;
        let mut dead: Vec<MessageRecord> = state
            .records
            .values()
            .filter(|r| r.state == DeliveryState::DeadLettered)
            .cloned()
            .collect();
        dead.sort_by_key(|r| r.message_id);
        dead
    }

    pub async fn record(&self, message_id: MessageId) -> Option<MessageRecord> {
        let state = self.state.lock().await;
        state.records.get(&message_id).cloned()
    }

    fn lease_for(&self, delivery: Delivery) -> Box<dyn DeliveryLease> {
        Box::new(InMemoryLease {
            delivery,
            channel: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
        })
    }
}

#[async_trait]
impl DecisionChannel for InMemoryDecisionChannel {
    async fn send(&self, message: ChannelMessage) -> Result<MessageId, InterlockError> {
        let message_id = self.ids.generate_message_id();
        let record = MessageRecord::new(message_id, message, self.clock.now());
        {
            let mut state = self.state.lock().await;
            state.records.insert(message_id, record);
            state.ready.push_back(message_id);
        }
        self.notify.notify_one();
        Ok(message_id)
    }

    async fn lease(&self) -> Option<Box<dyn DeliveryLease>> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                if let Some(delivery) = state.take_ready() {
                    return Some(self.lease_for(delivery));
                }
                state.scheduled.peek().map(|entry| entry.next_visible_at)
            };

            // send() か次の redelivery 時刻まで待つ
            if let Some(wake_at) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {},
                    _ = tokio::time::sleep_until(wake_at.into()) => {},
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn try_lease(&self) -> Option<Box<dyn DeliveryLease>> {
        let delivery = {
            let mut state = self.state.lock().await;
            state.take_ready()
        }?;
        Some(self.lease_for(delivery))
    }

    async fn counts(&self) -> Result<ChannelCounts, InterlockError> {
        let state = self.state.lock().await;
        Ok(state.counts())
    }
}

struct InMemoryLease {
    delivery: Delivery,
    channel: Arc<Mutex<ChannelState>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl DeliveryLease for InMemoryLease {
    fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    async fn ack(self: Box<Self>) -> Result<(), InterlockError> {
        let mut state = self.channel.lock().await;
        let record = state
            .records
            .get_mut(&self.delivery.message_id)
            .ok_or_else(|| {
                InterlockError::Channel(format!("unknown message {}", self.delivery.message_id))
            })?;
        record.mark_acknowledged();
        Ok(())
    }

    async fn fail(self: Box<Self>, error: String) -> Result<(), InterlockError> {
        let should_notify = {
            let mut state = self.channel.lock().await;
            let policy = state.policy.clone();
            let Some(record) = state.records.get_mut(&self.delivery.message_id) else {
                return Err(InterlockError::Channel(format!(
                    "unknown message {}",
                    self.delivery.message_id
                )));
            };

            if policy.should_dead_letter(record.receive_count) {
                record.mark_dead_lettered(error);
                false
            } else {
                let next_visible_at = Instant::now() + policy.next_delay(record.receive_count);
                record.schedule_redelivery(next_visible_at, error);
                state.scheduled.push(ScheduledRedelivery {
                    next_visible_at,
                    message_id: self.delivery.message_id,
                });
                true
            }
        };

        // lock の外で通知する
        if should_notify {
            self.notify.notify_one();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{ATTR_ACTION, ATTR_TYPE, MessageAttributes};
    use crate::ports::FixedClock;

    fn message() -> ChannelMessage {
        let mut attributes = MessageAttributes::new();
        attributes.insert(ATTR_TYPE.to_string(), "GuidedFailure".to_string());
        attributes.insert(ATTR_ACTION.to_string(), "Retry".to_string());
        ChannelMessage::new(b"{}".to_vec(), attributes)
    }

    fn fast_policy(max_receive_count: u32) -> RedeliveryPolicy {
        RedeliveryPolicy {
            base_delay: Duration::from_millis(10),
            multiplier: 1.0,
            max_receive_count,
        }
    }

    #[tokio::test]
    async fn send_and_counts() {
        let channel = InMemoryDecisionChannel::new(RedeliveryPolicy::default());
        channel.send(message()).await.unwrap();

        let counts = channel.counts().await.unwrap();
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.in_flight, 0);
    }

    #[tokio::test]
    async fn message_id_and_sent_at_share_the_injected_clock() {
        let at = chrono::DateTime::parse_from_rfc3339("2026-10-19T08:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let channel = InMemoryDecisionChannel::with_clock(
            RedeliveryPolicy::default(),
            Arc::new(FixedClock::new(at)),
        );
        let id = channel.send(message()).await.unwrap();

        let record = channel.record(id).await.unwrap();
        assert_eq!(record.sent_at, at);
        assert_eq!(id.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
    }

    #[tokio::test]
    async fn lease_transitions_to_in_flight() {
        let channel = InMemoryDecisionChannel::new(RedeliveryPolicy::default());
        let id = channel.send(message()).await.unwrap();

        let lease = tokio::time::timeout(Duration::from_millis(100), channel.lease())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.delivery().message_id, id);
        assert_eq!(lease.delivery().receive_count, 1);
        assert_eq!(lease.delivery().message, message());

        let counts = channel.counts().await.unwrap();
        assert_eq!(counts.queued, 0);
        assert_eq!(counts.in_flight, 1);
    }

    #[tokio::test]
    async fn ack_marks_acknowledged() {
        let channel = InMemoryDecisionChannel::new(RedeliveryPolicy::default());
        channel.send(message()).await.unwrap();
        let lease = channel.try_lease().await.unwrap();
        lease.ack().await.unwrap();

        let counts = channel.counts().await.unwrap();
        assert_eq!(counts.acknowledged, 1);
        assert_eq!(counts.in_flight, 0);
        assert!(channel.try_lease().await.is_none());
    }

    #[tokio::test]
    async fn failed_message_is_redelivered_after_backoff() {
        let channel = InMemoryDecisionChannel::new(fast_policy(3));
        let id = channel.send(message()).await.unwrap();

        channel
            .try_lease()
            .await
            .unwrap()
            .fail("platform unavailable".to_string())
            .await
            .unwrap();
        assert_eq!(channel.counts().await.unwrap().redelivery_scheduled, 1);

        let lease = tokio::time::timeout(Duration::from_secs(1), channel.lease())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.delivery().message_id, id);
        assert_eq!(lease.delivery().receive_count, 2);
    }

    #[tokio::test]
    async fn message_is_dead_lettered_at_receive_limit() {
        let channel = InMemoryDecisionChannel::new(fast_policy(1));
        let id = channel.send(message()).await.unwrap();

        channel
            .try_lease()
            .await
            .unwrap()
            .fail("bad payload".to_string())
            .await
            .unwrap();

        let dead = channel.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].message_id, id);
        assert_eq!(dead[0].last_error.as_deref(), Some("bad payload"));
        assert_eq!(channel.counts().await.unwrap().dead_lettered, 1);
    }

    #[tokio::test]
    async fn try_lease_returns_none_while_backing_off() {
        let channel = InMemoryDecisionChannel::new(RedeliveryPolicy {
            base_delay: Duration::from_secs(60),
            ..RedeliveryPolicy::default()
        });
        channel.send(message()).await.unwrap();
        channel
            .try_lease()
            .await
            .unwrap()
            .fail("x".to_string())
            .await
            .unwrap();

        assert!(channel.try_lease().await.is_none());
    }

    #[tokio::test]
    async fn send_wakes_a_waiting_lease() {
        let channel = Arc::new(InMemoryDecisionChannel::new(RedeliveryPolicy::default()));

        let waiter = tokio::spawn({
            let channel = Arc::clone(&channel);
            async move { channel.lease().await.map(|l| l.delivery().message_id) }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let id = channel.send(message()).await.unwrap();

        let leased = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(leased, Some(id));
    }
}
