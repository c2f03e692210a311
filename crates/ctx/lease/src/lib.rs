//! Context Discovery Lease - expiry clock and liveness protocol
//!
//! Every registered component holds a lease. This crate provides:
//!
//! - **LeaseManager**: per-component expiry timers, generation tracking and
//!   the lease-end handshake state machine
//! - **Handshake messages**: lease-end, renewal, end-confirmation, ping
//!
//! ## Handshake
//!
//! ```text
//! arm ──► timer fires ──► LeaseExpiry ──► begin_handshake ──► leaseEnd sent
//!                                                              │
//!               ┌──────────────────────────────────────────────┤
//!               ▼                      ▼                       ▼
//!          leaseRenewal           leaseEnded             no reply / error
//!          re-arm (Renewed)       evict                  evict
//! ```
//!
//! Each arming gets a fresh generation number. Expiries and handshake
//! outcomes carrying an older generation are stale and ignored, so a
//! re-registration racing an in-flight handshake is never undone by it.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handshake;
pub mod manager;

pub use config::LeaseConfig;
pub use error::{LeaseError, LeaseResult};
pub use handshake::{HandshakeOutcome, HandshakeReply};
pub use manager::{ActiveLease, LeaseExpiry, LeaseManager, LeaseState, Resolution};
