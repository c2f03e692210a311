//! In-memory component registry
//!
//! A single [`IndexedStore`] behind a reader/writer lock. Searches share the
//! read side; registration, update and removal take the write side for the
//! mutation and its index maintenance together.

use crate::error::Result;
use crate::registry::ComponentRegistry;
use crate::store::IndexedStore;
use async_trait::async_trait;
use ctx_query::{IndexLookup, QueryItem, Rule};
use ctx_types::{Attributes, ComponentDescription, ComponentId, UpdateMode};
use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory component registry
#[derive(Default)]
pub struct InMemoryComponentRegistry {
    store: RwLock<IndexedStore>,
}

impl InMemoryComponentRegistry {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(IndexedStore::new()),
        }
    }
}

#[async_trait]
impl ComponentRegistry for InMemoryComponentRegistry {
    async fn add(&self, description: ComponentDescription) -> Result<Option<ComponentDescription>> {
        let id = description.id.clone();
        let previous = self.store.write().await.insert(description)?;
        debug!(component = %id, replaced = previous.is_some(), "Stored description");
        Ok(previous)
    }

    async fn remove(&self, id: &ComponentId) -> Result<Option<ComponentDescription>> {
        let removed = self.store.write().await.remove(id);
        if removed.is_some() {
            debug!(component = %id, "Removed description");
        }
        Ok(removed)
    }

    async fn update(
        &self,
        id: &ComponentId,
        delta: &Attributes,
        mode: UpdateMode,
    ) -> Result<ComponentDescription> {
        let updated = self.store.write().await.update(id, delta, mode)?;
        debug!(
            component = %id,
            mode = mode.as_str(),
            attributes = delta.len(),
            "Updated description"
        );
        Ok(updated)
    }

    async fn get(&self, id: &ComponentId) -> Result<Option<ComponentDescription>> {
        Ok(self.store.read().await.get(id).cloned())
    }

    async fn contains(&self, id: &ComponentId) -> Result<bool> {
        Ok(self.store.read().await.contains(id))
    }

    async fn list(&self) -> Result<Vec<ComponentDescription>> {
        let store = self.store.read().await;
        let mut descriptions: Vec<_> = store.descriptions().cloned().collect();
        descriptions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descriptions)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.store.read().await.len())
    }

    async fn search(&self, query: &QueryItem) -> Result<Vec<ComponentDescription>> {
        Ok(self.store.read().await.search(query))
    }

    async fn index_lookup(&self, rule: &Rule) -> Result<BTreeSet<ComponentId>> {
        Ok(self.store.read().await.select(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use ctx_query::{Comparison, Selector};
    use ctx_types::{Attribute, ComponentType};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_get_remove() {
        let registry = InMemoryComponentRegistry::new();
        let widget = ComponentDescription::new("w1", ComponentType::Widget);

        assert!(registry.add(widget.clone()).await.unwrap().is_none());
        assert_eq!(registry.get(&widget.id).await.unwrap(), Some(widget.clone()));
        assert_eq!(registry.len().await.unwrap(), 1);

        assert_eq!(registry.remove(&widget.id).await.unwrap(), Some(widget.clone()));
        assert!(!registry.contains(&widget.id).await.unwrap());
        assert!(registry.remove(&widget.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_is_visible_to_search() {
        let registry = InMemoryComponentRegistry::new();
        registry
            .add(
                ComponentDescription::new("w1", ComponentType::Widget)
                    .with_attribute(Attribute::new("temperature", 18)),
            )
            .await
            .unwrap();

        let warm = QueryItem::attribute("temperature", Comparison::Greater, 20);
        assert!(registry.search(&warm).await.unwrap().is_empty());

        let delta = Attributes::new().with(Attribute::new("temperature", 24));
        registry
            .update(&ComponentId::new("w1"), &delta, UpdateMode::Add)
            .await
            .unwrap();
        let found = registry.search(&warm).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ComponentId::new("w1"));

        let unknown = registry
            .update(&ComponentId::new("nope"), &delta, UpdateMode::Add)
            .await;
        assert!(matches!(unknown, Err(RegistryError::ComponentNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_lookup_uses_indices() {
        let registry = InMemoryComponentRegistry::new();
        for id in ["c", "a", "b"] {
            registry
                .add(ComponentDescription::new(id, ComponentType::Server).with_service("history"))
                .await
                .unwrap();
        }

        let ids: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let rule = Rule::new(Selector::Service, Comparison::Equal, "history");
        assert_eq!(registry.index_lookup(&rule).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(InMemoryComponentRegistry::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("w{}", i);
                registry
                    .add(
                        ComponentDescription::new(id.as_str(), ComponentType::Widget)
                            .with_attribute(Attribute::new("load", i as i64)),
                    )
                    .await
                    .unwrap();
                registry
                    .search(&QueryItem::type_is(ComponentType::Widget))
                    .await
                    .unwrap()
                    .len()
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap() >= 1);
        }
        assert_eq!(registry.len().await.unwrap(), 16);
    }
}
