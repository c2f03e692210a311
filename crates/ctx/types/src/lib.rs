//! Context Discovery Types - Core types for the discovery service
//!
//! The discovery service is the directory of a context-aware computing
//! middleware: context producers and consumers register into it, query it,
//! and subscribe to it for notifications about other components.
//!
//! ## Key Concepts
//!
//! - **ComponentDescription**: Identity and capabilities of one registered component
//! - **Attribute**: Typed name/value pair, constant or changing over time
//! - **Lease**: Time-bound validity contract for a registration
//! - **ErrorCode**: Outcome carried by every protocol reply
//! - **DataObject**: Structured message tree shared by every protocol payload
//!
//! The wire encoding of a [`DataObject`] (JSON, XML, ...) is owned by the
//! transport; this crate only defines the tree and the conversions into it.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod attribute;
pub mod codes;
pub mod description;
pub mod duration_ms;
pub mod ids;
pub mod lease;
pub mod message;

// Re-export main types
pub use attribute::{Attribute, AttributeType, AttributeValue, Attributes};
pub use codes::ErrorCode;
pub use description::{ComponentDescription, ComponentSummary, ComponentType, UpdateMode};
pub use ids::{ComponentId, SubscriptionId};
pub use lease::Lease;
pub use message::{DataObject, DecodeError, DecodeResult, FromDataObject, ToDataObject};
