//! Component registry trait
//!
//! The ComponentRegistry holds the descriptions of every registered
//! component and answers predicate searches over them.

use crate::error::Result;
use async_trait::async_trait;
use ctx_query::{QueryItem, Rule};
use ctx_types::{Attributes, ComponentDescription, ComponentId, UpdateMode};
use std::collections::BTreeSet;

/// Registry of component descriptions
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    /// Store a description, returning the one it replaced
    async fn add(&self, description: ComponentDescription) -> Result<Option<ComponentDescription>>;

    /// Remove a description
    async fn remove(&self, id: &ComponentId) -> Result<Option<ComponentDescription>>;

    /// Apply an attribute update, returning the updated description
    async fn update(
        &self,
        id: &ComponentId,
        delta: &Attributes,
        mode: UpdateMode,
    ) -> Result<ComponentDescription>;

    /// Get a description by ID
    async fn get(&self, id: &ComponentId) -> Result<Option<ComponentDescription>>;

    /// Check whether an ID is registered
    async fn contains(&self, id: &ComponentId) -> Result<bool>;

    /// List all descriptions, ordered by ID
    async fn list(&self) -> Result<Vec<ComponentDescription>>;

    /// Number of registered components
    async fn len(&self) -> Result<usize>;

    /// Descriptions matching a query, ordered by ID
    async fn search(&self, query: &QueryItem) -> Result<Vec<ComponentDescription>>;

    /// IDs selected by a single rule, answered from the indices
    async fn index_lookup(&self, rule: &Rule) -> Result<BTreeSet<ComponentId>>;
}
