//! Lease configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for lease handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Lease granted when a registration carries none.
    #[serde(with = "ctx_types::duration_ms")]
    pub default_duration: Duration,

    /// Shortest lease granted; shorter requests are raised to this.
    #[serde(with = "ctx_types::duration_ms")]
    pub min_duration: Duration,

    /// Longest lease granted; longer requests are lowered to this.
    #[serde(with = "ctx_types::duration_ms")]
    pub max_duration: Duration,

    /// Bounded wait for a lease-end reply.
    #[serde(with = "ctx_types::duration_ms")]
    pub handshake_timeout: Duration,

    /// Bounded wait for a ping reply.
    #[serde(with = "ctx_types::duration_ms")]
    pub ping_timeout: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_duration: Duration::from_secs(60),
            min_duration: Duration::from_secs(1),
            max_duration: Duration::from_secs(3600),
            handshake_timeout: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(2),
        }
    }
}

impl LeaseConfig {
    /// Config with short timings for tests.
    pub fn fast() -> Self {
        Self {
            default_duration: Duration::from_millis(500),
            min_duration: Duration::from_millis(10),
            max_duration: Duration::from_secs(60),
            handshake_timeout: Duration::from_millis(100),
            ping_timeout: Duration::from_millis(100),
        }
    }

    /// Bring a requested duration within `[min_duration, max_duration]`.
    pub fn clamp(&self, requested: Duration) -> Duration {
        requested.clamp(self.min_duration, self.max_duration.max(self.min_duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        let config = LeaseConfig::default();
        assert_eq!(config.clamp(Duration::ZERO), Duration::from_secs(1));
        assert_eq!(config.clamp(Duration::from_secs(90)), Duration::from_secs(90));
        assert_eq!(config.clamp(Duration::from_secs(86_400)), Duration::from_secs(3600));
    }
}
