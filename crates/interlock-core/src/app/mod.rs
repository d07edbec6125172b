//! App - アプリケーション層
//!
//! ports を組み合わせて decision request の流れを実装する。
//!
//! # 主要コンポーネント
//! - **RequestIngestor**: 入力パラメータを検証して channel に積む
//! - **MessageConsumer**: 1 メッセージ分のパイプライン（attributes → payload → context → breaker → resolver）
//! - **ContextResolver**: event から space と対象 document を決める
//! - **RetryLoopBreaker**: guided failure の回数を数えて Retry を Fail に変える
//! - **InterruptionResolver**: pending な interruption を claim して submit
//! - **ConsumerGroup**: channel を drain するワーカー群

pub mod consumer;
pub mod consumer_group;
pub mod context;
pub mod ingestor;
pub mod loop_breaker;
pub mod resolver;

pub use self::consumer::{MessageConsumer, ProcessOutcome};
pub use self::consumer_group::ConsumerGroup;
pub use self::context::{ContextResolver, DeploymentContext};
pub use self::ingestor::{
    PARAM_ACTION, PARAM_MAXIMUM_RETRY, PARAM_TYPE, RequestIngestor, RequestParams,
};
pub use self::loop_breaker::{RetryLoopBreaker, break_retry_loop};
pub use self::resolver::{InterruptionResolver, ResolutionReport};
