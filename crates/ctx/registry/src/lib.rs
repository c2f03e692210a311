//! Context Discovery Registry - keyed storage of component descriptions
//!
//! This crate provides the registry behind the discovery mediator:
//!
//! - **IndexedStore**: Descriptions plus secondary indices (id, type,
//!   classname, endpoint fields, attribute values, callbacks, services)
//! - **ComponentRegistry**: Async registry trait used by the mediator
//! - **InMemoryComponentRegistry**: Store guarded by a single reader/writer lock
//!
//! ## Consistency
//!
//! Writers hold the lock for the mutation and the index update together, so
//! concurrent `search` calls never observe a half-updated description. The
//! predicate tree only sees the store through
//! [`ctx_query::IndexLookup`], which keeps the index layout swappable.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod registry;
pub mod store;

// Re-exports
pub use error::{RegistryError, Result};
pub use memory::InMemoryComponentRegistry;
pub use registry::ComponentRegistry;
pub use store::IndexedStore;
