//! Impls - ports の実装
//!
//! - **OctopusClient**: 本番用の HTTP クライアント (reqwest)
//! - **InMemoryPlatform**: 開発用・テスト用。全呼び出しを記録する

pub mod inmem_platform;
pub mod octopus;

pub use self::inmem_platform::{CallKind, InMemoryPlatform, PlatformCall};
pub use self::octopus::{OctopusClient, OctopusSpaceRepository};
