//! Ports - 抽象化レイヤー
//!
//! Traits for everything outside the process: the deployment platform, time
//! and id generation. The decision channel port lives in `crate::channel`
//! next to its in-memory implementation.

pub mod clock;
pub mod id_generator;
pub mod platform;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{MessageIdGenerator, UlidGenerator};
pub use self::platform::{DeploymentPlatform, SpaceRepository};
