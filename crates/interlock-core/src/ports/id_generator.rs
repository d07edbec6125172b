//! MessageIdGenerator port - channel message ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（時刻でソート可能）

use crate::domain::ids::MessageId;
use crate::ports::Clock;
use ulid::Ulid;

pub trait MessageIdGenerator: Send + Sync {
    fn generate_message_id(&self) -> MessageId;
}

/// ULID generator whose timestamp part comes from a `Clock`, so tests with a
/// `FixedClock` get a deterministic time prefix.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> MessageIdGenerator for UlidGenerator<C> {
    fn generate_message_id(&self) -> MessageId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        MessageId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
