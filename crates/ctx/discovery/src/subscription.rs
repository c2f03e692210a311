//! Standing predicates and the table that holds them.

use std::fmt;

use ctx_query::QueryItem;
use ctx_transport::Endpoint;
use ctx_types::{ComponentDescription, ComponentId, SubscriptionId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Registry event a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryCallback {
    NewComponent,
    UpdatedComponent,
    RemovedComponent,
}

impl DiscoveryCallback {
    pub const ALL: [DiscoveryCallback; 3] = [
        DiscoveryCallback::NewComponent,
        DiscoveryCallback::UpdatedComponent,
        DiscoveryCallback::RemovedComponent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryCallback::NewComponent => "newComponent",
            DiscoveryCallback::UpdatedComponent => "updatedComponent",
            DiscoveryCallback::RemovedComponent => "removedComponent",
        }
    }

    pub fn parse(raw: &str) -> DiscoveryResult<Self> {
        Self::ALL
            .into_iter()
            .find(|callback| callback.as_str() == raw.trim())
            .ok_or_else(|| DiscoveryError::UnknownCallback(raw.to_string()))
    }
}

impl fmt::Display for DiscoveryCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A standing predicate bound to a notification target.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Subscribing component; its departure removes the subscription.
    pub owner: ComponentId,
    pub target: Endpoint,
    pub callback: DiscoveryCallback,
    /// Notify with the full description rather than the basic summary.
    pub full: bool,
    pub query: QueryItem,
}

/// All standing subscriptions.
#[derive(Default)]
pub struct SubscriptionTable {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subscription: Subscription) {
        debug!(
            subscription = %subscription.id,
            owner = %subscription.owner,
            callback = %subscription.callback,
            "Subscription stored"
        );
        self.subscriptions.write().await.push(subscription);
    }

    pub async fn remove(&self, id: &SubscriptionId) -> Option<Subscription> {
        let mut subscriptions = self.subscriptions.write().await;
        let position = subscriptions.iter().position(|s| s.id == *id)?;
        Some(subscriptions.remove(position))
    }

    /// Remove every subscription owned by `owner`.
    pub async fn remove_owned_by(&self, owner: &ComponentId) -> Vec<Subscription> {
        let mut subscriptions = self.subscriptions.write().await;
        let (removed, kept): (Vec<_>, Vec<_>) = subscriptions
            .drain(..)
            .partition(|s| &s.owner == owner);
        *subscriptions = kept;

        if !removed.is_empty() {
            debug!(owner = %owner, removed = removed.len(), "Cascaded subscription removal");
        }
        removed
    }

    /// Subscriptions bound to `callback` whose predicate definitely holds
    /// for `description`.
    pub async fn matching(
        &self,
        callback: DiscoveryCallback,
        description: &ComponentDescription,
    ) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.callback == callback && s.query.matches(description).is_true())
            .cloned()
            .collect()
    }

    pub async fn owned_by(&self, owner: &ComponentId) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .await
            .iter()
            .filter(|s| &s.owner == owner)
            .cloned()
            .collect()
    }

    pub async fn list(&self) -> Vec<Subscription> {
        self.subscriptions.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_types::ComponentType;

    fn subscription(owner: &str, callback: DiscoveryCallback, query: QueryItem) -> Subscription {
        Subscription {
            id: SubscriptionId::generate(),
            owner: ComponentId::new(owner),
            target: Endpoint::new("10.0.0.5", 7000),
            callback,
            full: false,
            query,
        }
    }

    #[tokio::test]
    async fn test_matching_filters_by_callback_and_predicate() {
        let table = SubscriptionTable::new();
        let widgets = QueryItem::type_is(ComponentType::Widget);
        table
            .insert(subscription("s1", DiscoveryCallback::NewComponent, widgets.clone()))
            .await;
        table
            .insert(subscription("s2", DiscoveryCallback::UpdatedComponent, widgets))
            .await;
        table
            .insert(subscription(
                "s3",
                DiscoveryCallback::NewComponent,
                QueryItem::type_is(ComponentType::Server),
            ))
            .await;

        let widget = ComponentDescription::new("w1", ComponentType::Widget);
        let matched = table
            .matching(DiscoveryCallback::NewComponent, &widget)
            .await;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].owner, ComponentId::new("s1"));
    }

    #[tokio::test]
    async fn test_cascade_removes_only_owned() {
        let table = SubscriptionTable::new();
        let query = QueryItem::type_is(ComponentType::Widget);
        table
            .insert(subscription("x", DiscoveryCallback::NewComponent, query.clone()))
            .await;
        table
            .insert(subscription("x", DiscoveryCallback::RemovedComponent, query.clone()))
            .await;
        let kept = subscription("y", DiscoveryCallback::NewComponent, query);
        table.insert(kept.clone()).await;

        let removed = table.remove_owned_by(&ComponentId::new("x")).await;
        assert_eq!(removed.len(), 2);
        assert_eq!(table.list().await, vec![kept.clone()]);

        assert_eq!(table.remove(&kept.id).await, Some(kept.clone()));
        assert!(table.remove(&kept.id).await.is_none());
    }

    #[test]
    fn test_callback_names() {
        assert_eq!(
            DiscoveryCallback::parse("removedComponent").unwrap(),
            DiscoveryCallback::RemovedComponent
        );
        assert!(matches!(
            DiscoveryCallback::parse("componentMoved"),
            Err(DiscoveryError::UnknownCallback(_))
        ));
    }
}
