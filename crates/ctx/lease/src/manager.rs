//! Lease manager.
//!
//! Owns one expiry timer per leased component. A timer that fires sends a
//! [`LeaseExpiry`] to the owner of the receiver returned by
//! [`LeaseManager::new`]; that owner then drives the lease-end handshake
//! through [`LeaseManager::begin_handshake`] and
//! [`LeaseManager::resolve_handshake`].

use std::sync::atomic::{AtomicU64, Ordering};

use ctx_transport::{Endpoint, Transport, TransportError};
use ctx_types::{ComponentId, Lease};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::LeaseConfig;
use crate::error::LeaseResult;
use crate::handshake::{self, HandshakeOutcome};

/// Where a lease is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    /// Timer running.
    Active,
    /// Timer fired; waiting for the lease-end reply.
    Handshaking,
}

/// Snapshot of a component's lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLease {
    pub component: ComponentId,
    pub lease: Lease,
    pub expires_at: Instant,
    pub generation: u64,
    pub state: LeaseState,
}

/// Sent when a lease timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseExpiry {
    pub component: ComponentId,
    pub generation: u64,
}

/// Result of resolving a lease-end handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Re-armed with the component's new lease.
    Renewed(ActiveLease),
    /// The lease is gone; the component must be evicted.
    Evict { reason: String },
    /// Superseded by a later arm or cancel; nothing to do.
    Stale,
}

struct LeaseEntry {
    lease: Lease,
    expires_at: Instant,
    generation: u64,
    state: LeaseState,
    timer: JoinHandle<()>,
}

impl LeaseEntry {
    fn snapshot(&self, component: &ComponentId) -> ActiveLease {
        ActiveLease {
            component: component.clone(),
            lease: self.lease,
            expires_at: self.expires_at,
            generation: self.generation,
            state: self.state,
        }
    }
}

/// Per-component lease timers.
pub struct LeaseManager {
    config: LeaseConfig,
    entries: DashMap<ComponentId, LeaseEntry>,
    next_generation: AtomicU64,
    expiry_tx: mpsc::UnboundedSender<LeaseExpiry>,
}

impl LeaseManager {
    pub fn new(config: LeaseConfig) -> (Self, mpsc::UnboundedReceiver<LeaseExpiry>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let manager = Self {
            config,
            entries: DashMap::new(),
            next_generation: AtomicU64::new(1),
            expiry_tx,
        };
        (manager, expiry_rx)
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Lease granted for a request, defaulted and clamped.
    pub fn grant(&self, requested: Option<Lease>) -> Lease {
        let duration = requested
            .map(|lease| lease.duration)
            .unwrap_or(self.config.default_duration);
        Lease::new(self.config.clamp(duration))
    }

    /// Start (or restart) the expiry timer for `component`.
    ///
    /// Any previous timer and any handshake in flight for the component are
    /// superseded.
    #[instrument(skip(self))]
    pub fn arm(&self, component: &ComponentId, requested: Option<Lease>) -> ActiveLease {
        let lease = self.grant(requested);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let expires_at = Instant::now() + lease.duration;

        let timer = {
            let tx = self.expiry_tx.clone();
            let expiry = LeaseExpiry {
                component: component.clone(),
                generation,
            };
            tokio::spawn(async move {
                tokio::time::sleep_until(expires_at).await;
                let _ = tx.send(expiry);
            })
        };

        let entry = LeaseEntry {
            lease,
            expires_at,
            generation,
            state: LeaseState::Active,
            timer,
        };
        let snapshot = entry.snapshot(component);

        if let Some(previous) = self.entries.insert(component.clone(), entry) {
            previous.timer.abort();
        }

        debug!(
            component = %component,
            generation,
            duration_ms = lease.duration.as_millis() as u64,
            "Lease armed"
        );
        snapshot
    }

    /// Drop the lease without a handshake.
    #[instrument(skip(self))]
    pub fn cancel(&self, component: &ComponentId) -> Option<ActiveLease> {
        let (_, entry) = self.entries.remove(component)?;
        entry.timer.abort();
        debug!(component = %component, generation = entry.generation, "Lease cancelled");
        Some(entry.snapshot(component))
    }

    pub fn lease(&self, component: &ComponentId) -> Option<ActiveLease> {
        self.entries
            .get(component)
            .map(|entry| entry.snapshot(component))
    }

    pub fn state(&self, component: &ComponentId) -> Option<LeaseState> {
        self.entries.get(component).map(|entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move a fired lease into the handshake state.
    ///
    /// Returns `false` for a stale expiry: the lease was re-armed or
    /// cancelled after the timer fired, or a handshake is already running.
    #[instrument(skip(self))]
    pub fn begin_handshake(&self, expiry: &LeaseExpiry) -> bool {
        let Some(mut entry) = self.entries.get_mut(&expiry.component) else {
            return false;
        };
        if entry.generation != expiry.generation || entry.state != LeaseState::Active {
            return false;
        }

        entry.state = LeaseState::Handshaking;
        drop(entry);

        info!(
            component = %expiry.component,
            generation = expiry.generation,
            "Lease expired, starting handshake"
        );
        true
    }

    /// Apply the outcome of the handshake started for `generation`.
    ///
    /// A renewal re-arms the lease from now; an explicit end or any failure
    /// removes it and asks the caller to evict.
    #[instrument(skip(self))]
    pub fn resolve_handshake(
        &self,
        component: &ComponentId,
        generation: u64,
        outcome: HandshakeOutcome,
    ) -> Resolution {
        match self.entries.entry(component.clone()) {
            Entry::Occupied(entry)
                if entry.get().generation == generation
                    && entry.get().state == LeaseState::Handshaking =>
            {
                match outcome {
                    HandshakeOutcome::Renewed(lease) => {
                        drop(entry);
                        let renewed = self.arm(component, Some(lease));
                        info!(
                            component = %component,
                            duration_ms = renewed.lease.duration.as_millis() as u64,
                            "Lease renewed"
                        );
                        Resolution::Renewed(renewed)
                    }
                    HandshakeOutcome::Ended => {
                        entry.remove();
                        self.evicted(component, "lease ended by component".to_string())
                    }
                    HandshakeOutcome::Failed(reason) => {
                        entry.remove();
                        warn!(component = %component, reason = %reason, "Lease handshake failed");
                        self.evicted(component, reason)
                    }
                }
            }
            _ => {
                debug!(component = %component, generation, "Ignoring stale handshake outcome");
                Resolution::Stale
            }
        }
    }

    fn evicted(&self, component: &ComponentId, reason: String) -> Resolution {
        info!(component = %component, reason = %reason, "Lease evicted");
        Resolution::Evict { reason }
    }

    /// Ask a component whether it is alive, waiting at most `ping_timeout`.
    #[instrument(skip(self, transport))]
    pub async fn ping(
        &self,
        transport: &dyn Transport,
        component: &ComponentId,
        endpoint: &Endpoint,
    ) -> LeaseResult<()> {
        let request = transport.request(endpoint, handshake::ping_request(component));
        let reply = tokio::time::timeout(self.config.ping_timeout, request)
            .await
            .map_err(|_| TransportError::Timeout(self.config.ping_timeout))??;
        handshake::check_pong(component, &reply)
    }
}

impl Drop for LeaseManager {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.timer.abort();
        }
    }
}
