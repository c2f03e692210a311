//! Context Discovery Query - composable predicates over component descriptions
//!
//! A [`QueryItem`] is a tree of leaf [`Rule`]s combined with AND, OR, NOT
//! and ELSE (`NOT(OR(..))`). It is evaluated two ways:
//!
//! - [`QueryItem::matches`] against a single description, yielding a
//!   three-valued [`Outcome`]
//! - [`QueryItem::search`] against a whole registry through the narrow
//!   [`IndexLookup`] interface, yielding the set of matching ids
//!
//! The two agree: an id is in `search` exactly when `matches` is
//! [`Outcome::True`] for its description.
//!
//! ## Example
//!
//! ```rust
//! use ctx_query::{QueryItem, Selector, Outcome};
//! use ctx_types::{Attribute, ComponentDescription, ComponentType};
//!
//! let query = QueryItem::and(vec![
//!     QueryItem::type_is(ComponentType::Widget),
//!     QueryItem::attribute_equals("room", "kitchen"),
//! ]);
//!
//! let widget = ComponentDescription::new("w1", ComponentType::Widget)
//!     .with_constant(Attribute::new("room", "kitchen"));
//! assert_eq!(query.matches(&widget), Outcome::True);
//! ```

#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod item;
pub mod lookup;
pub mod outcome;
pub mod selector;

pub use error::{QueryError, QueryResult};
pub use item::{QueryItem, Rule};
pub use lookup::IndexLookup;
pub use outcome::Outcome;
pub use selector::{Comparison, Selector};
