//! interlock-core
//!
//! Automated responses to paused deployments.
//!
//! A decision request ("answer GuidedFailure interruptions of this deployment
//! with Retry") is accepted by the ingestor, travels through an at-least-once
//! channel, and is applied by the consumer: it claims and submits every pending
//! interruption, turning Retry into Fail once the deployment has failed more
//! often than allowed.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, decision, request, event, interruption, errors）
//! - **ports**: 抽象化レイヤー（DeploymentPlatform, SpaceRepository, Clock, MessageIdGenerator）
//! - **channel**: DecisionChannel / DeliveryLease と in-memory 実装
//! - **app**: ingestor, consumer, loop breaker, resolver, consumer group
//! - **impls**: OctopusClient（HTTP）と InMemoryPlatform（開発・テスト用）
//! - **config**: 起動時に一度だけ読む設定
//! - **observability**: logging 初期化と channel のカウント

pub mod app;
pub mod channel;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use self::config::InterlockConfig;
pub use self::domain::{ErrorKind, InterlockError};
