//! Narrow registry interface used by `search`.
//!
//! The predicate tree never reaches into registry internals; leaves ask the
//! registry for the ids a rule selects, and composites combine those sets.

use std::collections::BTreeSet;

use ctx_types::ComponentId;

use crate::item::Rule;

/// Index-backed evaluation of leaf rules.
pub trait IndexLookup {
    /// Every registered id.
    fn all_ids(&self) -> BTreeSet<ComponentId>;

    /// Ids whose description makes `rule` evaluate to
    /// [`Outcome::True`](crate::Outcome::True).
    ///
    /// Implementations must answer from their indices, and must agree with
    /// [`Rule::matches`] for every stored description.
    fn select(&self, rule: &Rule) -> BTreeSet<ComponentId>;
}
