//! Context Discovery Transport - the messaging substrate boundary
//!
//! The mediator and its clients exchange [`DataObject`] trees. This crate
//! owns delivery mechanics only:
//!
//! - **Transport**: synchronous request/reply and multicast
//! - **IndependentDispatcher**: fire-and-forget requests on a bounded pool,
//!   with replies delivered later as correlated [`Completion`]s
//! - **lookup_with_backoff**: client-side multicast lookup with exponential backoff
//! - **InMemoryTransport**: scripted in-process transport for tests and development
//! - **TcpTransport**: newline-delimited JSON over TCP, lookups over UDP multicast

#![deny(unsafe_code)]

pub mod backoff;
pub mod codec;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use ctx_types::DataObject;

pub use backoff::{lookup_with_backoff, BackoffPolicy};
pub use dispatcher::{Completion, CorrelationKey, DispatchConfig, IndependentDispatcher, Purpose};
pub use endpoint::Endpoint;
pub use error::{TransportError, TransportResult};
pub use memory::{InMemoryTransport, SentMessage};
pub use tcp::{TcpConfig, TcpTransport, DEFAULT_MULTICAST_GROUP};

/// Delivery of structured messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `message` to `endpoint` and wait for its reply.
    async fn request(&self, endpoint: &Endpoint, message: DataObject)
        -> TransportResult<DataObject>;

    /// Send `message` to the discovery multicast group.
    ///
    /// Returns the first reply received within the transport's reply window,
    /// or `None` when nobody answered.
    async fn multicast(&self, message: DataObject) -> TransportResult<Option<DataObject>>;
}
