//! Context Discovery - the discovery service
//!
//! Components register their descriptions here, query for each other and
//! subscribe to be told when matching components arrive, change or leave.
//!
//! - **DiscoveryMediator**: carries out register, update, unregister, query,
//!   subscribe and lease renewal; drives lease expiries and handshakes
//! - **SubscriptionTable**: standing predicates bound to notification targets
//! - **ProtocolHandler**: request decoding, identity check, reply codes
//! - **DiscoveryLog**: who was registered, replayed through ping
//!   verification on startup
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ctx_discovery::{DiscoveryMediator, MediatorConfig, ProtocolHandler};
//! use ctx_transport::TcpTransport;
//!
//! # async fn example() {
//! let (mediator, channels) =
//!     DiscoveryMediator::in_memory(MediatorConfig::default(), Arc::new(TcpTransport::default()));
//! let mediator = Arc::new(mediator);
//! let handler = ProtocolHandler::new(mediator.clone());
//!
//! tokio::spawn(async move {
//!     mediator.run(channels, std::future::pending()).await;
//! });
//! # let _ = handler;
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod log;
pub mod mediator;
pub mod notify;
pub mod paging;
pub mod protocol;
pub mod subscription;

pub use config::MediatorConfig;
pub use error::{DiscoveryError, DiscoveryResult};
pub use handler::ProtocolHandler;
pub use log::{DiscoveryLog, FileDiscoveryLog, LogError, NoopLog};
pub use mediator::{DiscoveryMediator, MediatorChannels, RegistrationState};
pub use notify::{ComponentNotification, NotificationPayload};
pub use paging::{CursorTable, QueryPage};
pub use protocol::{LookupRequest, Reply, ReplyBody, Request, RequestBody, SubscribeRequest};
pub use subscription::{DiscoveryCallback, Subscription, SubscriptionTable};
