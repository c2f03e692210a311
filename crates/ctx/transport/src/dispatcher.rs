//! Independent (fire-and-forget) requests.
//!
//! [`IndependentDispatcher::dispatch`] returns as soon as the request is
//! handed to a background task. The task waits for a pool permit, sends the
//! request under a bounded wait, and reports the outcome as a
//! [`Completion`] on the channel returned by [`IndependentDispatcher::new`].
//! Completions are matched to their origin by [`CorrelationKey`], never by
//! the identity of the request object.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ctx_types::{ComponentId, DataObject, SubscriptionId};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{TransportError, TransportResult};
use crate::Transport;

/// Why an independent request was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Lease-end handshake for one arming of a lease.
    LeaseEnd { generation: u64 },
    /// Subscription match notification.
    Notification { subscription: SubscriptionId },
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::LeaseEnd { generation } => write!(f, "leaseEnd#{}", generation),
            Purpose::Notification { subscription } => write!(f, "notification({})", subscription),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub component: ComponentId,
    pub purpose: Purpose,
}

impl CorrelationKey {
    pub fn new(component: ComponentId, purpose: Purpose) -> Self {
        Self { component, purpose }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.purpose)
    }
}

/// Outcome of one independent request.
#[derive(Debug, Clone)]
pub struct Completion {
    pub key: CorrelationKey,
    pub result: TransportResult<DataObject>,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Requests allowed in flight at once.
    pub max_in_flight: usize,

    /// Bounded wait applied when the caller gives none.
    #[serde(with = "ctx_types::duration_ms")]
    pub request_timeout: Duration,

    /// Completions buffered before senders wait on the receiver.
    pub completion_buffer: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            request_timeout: Duration::from_secs(5),
            completion_buffer: 256,
        }
    }
}

/// Sends requests without blocking the caller.
#[derive(Clone)]
pub struct IndependentDispatcher {
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    timeout: Duration,
    completions: mpsc::Sender<Completion>,
}

impl IndependentDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &DispatchConfig,
    ) -> (Self, mpsc::Receiver<Completion>) {
        let max_in_flight = config.max_in_flight.max(1);
        let (tx, rx) = mpsc::channel(config.completion_buffer.max(1));
        let dispatcher = Self {
            transport,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            timeout: config.request_timeout,
            completions: tx,
        };
        (dispatcher, rx)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Dispatch with the configured timeout.
    pub fn dispatch(&self, key: CorrelationKey, endpoint: Endpoint, message: DataObject) {
        self.dispatch_with_timeout(key, endpoint, message, self.timeout);
    }

    /// Dispatch with an explicit bounded wait; exceeding it completes with
    /// [`TransportError::Timeout`].
    pub fn dispatch_with_timeout(
        &self,
        key: CorrelationKey,
        endpoint: Endpoint,
        message: DataObject,
        timeout: Duration,
    ) {
        let transport = Arc::clone(&self.transport);
        let permits = Arc::clone(&self.permits);
        let completions = self.completions.clone();

        debug!(key = %key, endpoint = %endpoint, "Dispatching independent request");

        tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => {
                    match tokio::time::timeout(timeout, transport.request(&endpoint, message)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout(timeout)),
                    }
                }
                Err(_) => Err(TransportError::Closed(endpoint)),
            };

            if completions.send(Completion { key, result }).await.is_err() {
                warn!("Completion receiver dropped; discarding independent request outcome");
            }
        });
    }

    /// Requests currently holding a pool permit.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }
}
