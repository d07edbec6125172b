//! Consumer group: N workers draining the decision channel.
//!
//! lease → process → ack / fail。retry するか dead-letter にするかは
//! channel 側が決める（consumer は結果を報告するだけ）。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use super::consumer::MessageConsumer;
use crate::channel::DecisionChannel;

/// Consumer group handle.
/// - `request_shutdown()` でワーカー全体が新しい lease を取らなくなる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct ConsumerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl ConsumerGroup {
    /// Spawn `n` workers sharing one consumer. `n == 0` is treated as 1.
    pub fn spawn(
        n: usize,
        channel: Arc<dyn DecisionChannel>,
        consumer: Arc<MessageConsumer>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let n = n.max(1);
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let ch = Arc::clone(&channel);
            let c = Arc::clone(&consumer);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(
                async move { consumer_loop(ch, c, &mut rx).await }
                    .instrument(info_span!("consumer", worker_id)),
            );
            joins.push(join);
        }
        info!(workers = n, "consumer group started");

        Self { shutdown_tx, joins }
    }

    /// Stop taking new leases. In-flight messages finish normally.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                error!(error = %e, "consumer worker panicked");
            }
        }
        info!("consumer group stopped");
    }
}

async fn consumer_loop(
    channel: Arc<dyn DecisionChannel>,
    consumer: Arc<MessageConsumer>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は待つので shutdown と競合させる
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // sender dropped
                    break;
                }
                continue;
            }
            lease = channel.lease() => lease,
        };

        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        // process 中に lease を借用し続けないよう owned にしておく
        let delivery = lease.delivery().clone();
        let message_id = delivery.message_id;
        let receive_count = delivery.receive_count;
        let result = consumer
            .process(&delivery.message)
            .instrument(info_span!("delivery", %message_id, receive_count))
            .await;

        match result {
            Ok(_) => {
                if let Err(e) = lease.ack().await {
                    error!(%message_id, error = %e, "ack failed");
                }
            }
            Err(err) => {
                error!(
                    %message_id,
                    receive_count,
                    kind = ?err.kind(),
                    error = %err,
                    "decision request failed"
                );
                if let Err(e) = lease.fail(err.to_string()).await {
                    warn!(%message_id, error = %e, "fail report failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::channel::{InMemoryDecisionChannel, RedeliveryPolicy};
    use crate::domain::{
        DecisionAction, DecisionRequest, DocumentId, InterruptionId, InterruptionRecord,
        InterruptionType, SpaceId,
    };
    use crate::impls::InMemoryPlatform;

    fn request(body: Vec<u8>) -> DecisionRequest {
        DecisionRequest {
            interruption_type: InterruptionType::ManualIntervention,
            action: DecisionAction::Proceed,
            maximum_retry: "1".to_string(),
            raw_payload: body,
        }
    }

    async fn wait_drained(channel: &InMemoryDecisionChannel) {
        for _ in 0..200 {
            if channel.counts().await.unwrap().is_drained() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("channel did not drain: {:?}", channel.counts().await);
    }

    #[tokio::test]
    async fn workers_process_and_ack() {
        let space = SpaceId::new("Spaces-1");
        let platform = InMemoryPlatform::new();
        for n in 1..=3 {
            platform
                .add_interruption(
                    &space,
                    InterruptionRecord::new(
                        format!("Interruptions-{n}").as_str(),
                        DocumentId::new(format!("Deployments-{n}")),
                    ),
                )
                .await;
        }

        let channel = Arc::new(InMemoryDecisionChannel::new(RedeliveryPolicy::default()));
        for n in 1..=3 {
            let body = serde_json::to_vec(&json!({
                "Payload": { "Event": {
                    "SpaceId": "Spaces-1",
                    "RelatedDocumentIds": [format!("Deployments-{n}")],
                }}
            }))
            .unwrap();
            channel.send(request(body).to_message()).await.unwrap();
        }

        let group = ConsumerGroup::spawn(
            2,
            channel.clone(),
            Arc::new(MessageConsumer::new(Arc::new(platform.clone()))),
        );
        wait_drained(&channel).await;
        group.shutdown_and_join().await;

        let counts = channel.counts().await.unwrap();
        assert_eq!(counts.acknowledged, 3);
        for n in 1..=3 {
            let rec = platform
                .interruption(&space, &InterruptionId::new(format!("Interruptions-{n}")))
                .await
                .unwrap();
            assert!(!rec.is_pending);
            assert_eq!(rec.form.get_str("ManualIntervention"), Some("Proceed"));
        }
    }

    #[tokio::test]
    async fn failing_message_ends_up_dead_lettered() {
        let policy = RedeliveryPolicy {
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_receive_count: 2,
        };
        let channel = Arc::new(InMemoryDecisionChannel::new(policy));
        let id = channel
            .send(request(b"garbage".to_vec()).to_message())
            .await
            .unwrap();

        let group = ConsumerGroup::spawn(
            1,
            channel.clone(),
            Arc::new(MessageConsumer::new(Arc::new(InMemoryPlatform::new()))),
        );
        wait_drained(&channel).await;
        group.shutdown_and_join().await;

        let dead = channel.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].message_id, id);
        assert_eq!(dead[0].receive_count, 2);
        assert!(dead[0].last_error.as_deref().unwrap_or_default().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn idle_group_shuts_down() {
        let channel = Arc::new(InMemoryDecisionChannel::new(RedeliveryPolicy::default()));
        let group = ConsumerGroup::spawn(
            3,
            channel,
            Arc::new(MessageConsumer::new(Arc::new(InMemoryPlatform::new()))),
        );
        tokio::time::timeout(Duration::from_secs(1), group.shutdown_and_join())
            .await
            .unwrap();
    }
}
