//! Client-side discoverer lookup.
//!
//! Components find the mediator by multicasting a lookup and retrying with
//! exponential backoff until one answers. The mediator tolerates the
//! duplicate lookups this produces.

use std::time::Duration;

use ctx_types::DataObject;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::Transport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Total lookups sent, including the first.
    pub max_attempts: u32,
    /// Wait after the first unanswered lookup; doubled after each further one.
    pub initial_delay: Duration,
    /// Upper bound on a single wait.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    /// Wait after the given (1-based) unanswered attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Multicast `lookup` until a reply arrives or the attempts run out.
///
/// Transport errors on an attempt count as no answer.
pub async fn lookup_with_backoff(
    transport: &dyn Transport,
    lookup: DataObject,
    policy: &BackoffPolicy,
) -> TransportResult<DataObject> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match transport.multicast(lookup.clone()).await {
            Ok(Some(reply)) => return Ok(reply),
            Ok(None) => debug!(attempt, "Discoverer lookup unanswered"),
            Err(e) => debug!(attempt, error = %e, "Discoverer lookup failed"),
        }

        if attempt < attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(TransportError::LookupExhausted { attempts })
}
