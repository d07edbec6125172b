//! Redelivery policy: backoff between receives and the dead-letter limit.

use std::time::Duration;

use serde::Deserialize;

/// Upper bound for a single backoff (SQS caps message delays at 15 minutes).
pub const MAX_REDELIVERY_DELAY: Duration = Duration::from_secs(15 * 60);

/// Redelivery policy for failed messages.
///
/// Mirrors an SQS redrive policy: a message is offered at most
/// `max_receive_count` times, then dead-lettered.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RedeliveryPolicy {
    /// Delay before the first redelivery.
    #[serde(with = "duration_secs")]
    pub base_delay: Duration,

    /// Backoff multiplier.
    pub multiplier: f64,

    /// Receives allowed before the message is dead-lettered.
    pub max_receive_count: u32,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_receive_count: 3,
        }
    }
}

impl RedeliveryPolicy {
    /// Delay before the next receive, given how many receives already happened.
    ///
    /// delay = base_delay * multiplier^(receive_count - 1)
    /// The result saturates at `MAX_REDELIVERY_DELAY`; overflow and
    /// out-of-range values never panic.
    pub fn next_delay(&self, receive_count: u32) -> Duration {
        let exponent = receive_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs)
            .unwrap_or(MAX_REDELIVERY_DELAY)
            .min(MAX_REDELIVERY_DELAY)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "redelivery multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            ));
        }
        if self.max_receive_count == 0 {
            return Err("redelivery max_receive_count must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn should_dead_letter(&self, receive_count: u32) -> bool {
        receive_count >= self.max_receive_count
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("delay must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
