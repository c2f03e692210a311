//! Descriptions plus secondary indices.
//!
//! Every dimension a rule can select on has its own index: the fixed
//! description fields, each attribute name, and the callback and service
//! sets. Index entries are maintained on every insert, update and remove,
//! so an index never names an id that is no longer registered.

use std::collections::{BTreeSet, HashMap};

use ctx_query::selector::Resolved;
use ctx_query::{Comparison, IndexLookup, QueryItem, Rule, Selector};
use ctx_types::{AttributeValue, Attributes, ComponentDescription, ComponentId, UpdateMode};

use crate::error::{RegistryError, Result};

/// Fixed description fields that are indexed by value.
const FIELDS: [Selector; 7] = [
    Selector::Id,
    Selector::ComponentType,
    Selector::Classname,
    Selector::Hostname,
    Selector::HostAddress,
    Selector::Port,
    Selector::Version,
];

/// Hashable form of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Str(String),
    Int(i64),
    Float(u64),
    Bool(bool),
}

impl From<&AttributeValue> for ValueKey {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::String(s) => ValueKey::Str(s.clone()),
            AttributeValue::Integer(i) => ValueKey::Int(*i),
            AttributeValue::Float(f) => ValueKey::Float(f.to_bits()),
            AttributeValue::Boolean(b) => ValueKey::Bool(*b),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    value: AttributeValue,
    ids: BTreeSet<ComponentId>,
}

/// Value -> ids index for one dimension.
#[derive(Debug, Default)]
struct ValueIndex {
    buckets: HashMap<ValueKey, Bucket>,
}

impl ValueIndex {
    fn insert(&mut self, value: AttributeValue, id: ComponentId) {
        self.buckets
            .entry(ValueKey::from(&value))
            .or_insert_with(|| Bucket {
                value,
                ids: BTreeSet::new(),
            })
            .ids
            .insert(id);
    }

    fn remove(&mut self, value: &AttributeValue, id: &ComponentId) {
        let key = ValueKey::from(value);
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.ids.remove(id);
            if bucket.ids.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    #[cfg(test)]
    fn ids(&self) -> BTreeSet<ComponentId> {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.ids.iter().cloned())
            .collect()
    }

    fn select(&self, rule: &Rule) -> BTreeSet<ComponentId> {
        // Strings and booleans only ever equal a value of their own type.
        if rule.comparison == Comparison::Equal
            && matches!(
                rule.operand,
                AttributeValue::String(_) | AttributeValue::Boolean(_)
            )
        {
            return self
                .buckets
                .get(&ValueKey::from(&rule.operand))
                .map(|bucket| bucket.ids.clone())
                .unwrap_or_default();
        }

        self.buckets
            .values()
            .filter(|bucket| rule.evaluate_value(&bucket.value).is_true())
            .flat_map(|bucket| bucket.ids.iter().cloned())
            .collect()
    }
}

/// Name -> holders index for set-valued selectors.
type MembershipIndex = HashMap<String, BTreeSet<ComponentId>>;

fn membership_insert(index: &mut MembershipIndex, names: &BTreeSet<String>, id: &ComponentId) {
    for name in names {
        index.entry(name.clone()).or_default().insert(id.clone());
    }
}

fn membership_remove(index: &mut MembershipIndex, names: &BTreeSet<String>, id: &ComponentId) {
    for name in names {
        if let Some(holders) = index.get_mut(name) {
            holders.remove(id);
            if holders.is_empty() {
                index.remove(name);
            }
        }
    }
}

/// Registered descriptions and their indices.
#[derive(Debug, Default)]
pub struct IndexedStore {
    descriptions: HashMap<ComponentId, ComponentDescription>,
    fields: HashMap<Selector, ValueIndex>,
    attributes: HashMap<String, ValueIndex>,
    callbacks: MembershipIndex,
    services: MembershipIndex,
}

impl IndexedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.descriptions.contains_key(id)
    }

    pub fn get(&self, id: &ComponentId) -> Option<&ComponentDescription> {
        self.descriptions.get(id)
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &ComponentDescription> {
        self.descriptions.values()
    }

    /// Store a description, replacing any previous one with the same id.
    pub fn insert(
        &mut self,
        description: ComponentDescription,
    ) -> Result<Option<ComponentDescription>> {
        if description.id.is_empty() {
            return Err(RegistryError::InvalidDescription(
                "component id must not be empty".to_string(),
            ));
        }

        let previous = self.remove(&description.id);
        self.index(&description);
        self.descriptions.insert(description.id.clone(), description);
        Ok(previous)
    }

    pub fn remove(&mut self, id: &ComponentId) -> Option<ComponentDescription> {
        let description = self.descriptions.remove(id)?;
        self.unindex(&description);
        Some(description)
    }

    /// Apply an attribute update and re-index the description.
    ///
    /// Fails without touching the store when the id is unknown or the delta
    /// names a constant attribute.
    pub fn update(
        &mut self,
        id: &ComponentId,
        delta: &Attributes,
        mode: UpdateMode,
    ) -> Result<ComponentDescription> {
        let current = self
            .descriptions
            .get(id)
            .ok_or_else(|| RegistryError::ComponentNotFound(id.clone()))?;

        if let Some(constant) = delta
            .iter()
            .find(|attribute| current.constant_attributes.contains(&attribute.name))
        {
            return Err(RegistryError::ConstantAttribute {
                id: id.clone(),
                name: constant.name.clone(),
            });
        }

        let mut description = self
            .remove(id)
            .ok_or_else(|| RegistryError::ComponentNotFound(id.clone()))?;
        description.apply_update(delta, mode);
        self.index(&description);
        self.descriptions.insert(id.clone(), description.clone());
        Ok(description)
    }

    /// Matching descriptions, ordered by id.
    pub fn search(&self, query: &QueryItem) -> Vec<ComponentDescription> {
        query
            .search(self)
            .iter()
            .filter_map(|id| self.descriptions.get(id))
            .cloned()
            .collect()
    }

    fn index(&mut self, description: &ComponentDescription) {
        let id = &description.id;

        for field in &FIELDS {
            if let Resolved::Value(value) = field.resolve(description) {
                self.fields
                    .entry(field.clone())
                    .or_default()
                    .insert(value, id.clone());
            }
        }

        for attribute in description.resolved_attributes() {
            if let Some(value) = &attribute.value {
                self.attributes
                    .entry(attribute.name.clone())
                    .or_default()
                    .insert(value.clone(), id.clone());
            }
        }

        membership_insert(&mut self.callbacks, &description.callbacks, id);
        membership_insert(&mut self.services, &description.services, id);
    }

    fn unindex(&mut self, description: &ComponentDescription) {
        let id = &description.id;

        for field in &FIELDS {
            if let Resolved::Value(value) = field.resolve(description) {
                if let Some(index) = self.fields.get_mut(field) {
                    index.remove(&value, id);
                }
            }
        }

        for attribute in description.resolved_attributes() {
            if let Some(value) = &attribute.value {
                if let Some(index) = self.attributes.get_mut(&attribute.name) {
                    index.remove(value, id);
                    if index.is_empty() {
                        self.attributes.remove(&attribute.name);
                    }
                }
            }
        }

        membership_remove(&mut self.callbacks, &description.callbacks, id);
        membership_remove(&mut self.services, &description.services, id);
    }

    fn select_membership(&self, index: &MembershipIndex, rule: &Rule) -> BTreeSet<ComponentId> {
        let Some(name) = rule.operand.as_str() else {
            return BTreeSet::new();
        };
        let holders = index.get(name).cloned().unwrap_or_default();
        match rule.comparison {
            Comparison::Equal => holders,
            Comparison::Different => self
                .descriptions
                .keys()
                .filter(|id| !holders.contains(*id))
                .cloned()
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

impl IndexLookup for IndexedStore {
    fn all_ids(&self) -> BTreeSet<ComponentId> {
        self.descriptions.keys().cloned().collect()
    }

    fn select(&self, rule: &Rule) -> BTreeSet<ComponentId> {
        match &rule.selector {
            Selector::Callback => self.select_membership(&self.callbacks, rule),
            Selector::Service => self.select_membership(&self.services, rule),
            Selector::Attribute(name) => self
                .attributes
                .get(name)
                .map(|index| index.select(rule))
                .unwrap_or_default(),
            field => self
                .fields
                .get(field)
                .map(|index| index.select(rule))
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_types::{Attribute, AttributeType, ComponentType};

    fn store() -> IndexedStore {
        let mut store = IndexedStore::new();
        store
            .insert(
                ComponentDescription::new("a", ComponentType::Widget)
                    .with_endpoint("h1", "10.0.0.1", 5001)
                    .with_constant(Attribute::new("room", "kitchen"))
                    .with_attribute(Attribute::new("temperature", 21))
                    .with_callback("update"),
            )
            .unwrap();
        store
            .insert(
                ComponentDescription::new("b", ComponentType::Server)
                    .with_endpoint("h2", "10.0.0.2", 6001)
                    .with_constant(Attribute::new("room", "kitchen"))
                    .with_service("history"),
            )
            .unwrap();
        store
    }

    impl IndexedStore {
        /// Ids whose `selector` dimension equals `value`.
        pub fn lookup(&self, selector: &Selector, value: &AttributeValue) -> BTreeSet<ComponentId> {
            self.select(&Rule::new(selector.clone(), Comparison::Equal, value.clone()))
        }

        /// Every id currently present in the index for `selector`.
        pub fn indexed_ids(&self, selector: &Selector) -> BTreeSet<ComponentId> {
            match selector {
                Selector::Attribute(name) => self
                    .attributes
                    .get(name)
                    .map(ValueIndex::ids)
                    .unwrap_or_default(),
                Selector::Callback => self.callbacks.values().flatten().cloned().collect(),
                Selector::Service => self.services.values().flatten().cloned().collect(),
                field => self.fields.get(field).map(ValueIndex::ids).unwrap_or_default(),
            }
        }
    }

    fn ids(names: &[&str]) -> BTreeSet<ComponentId> {
        names.iter().map(|n| ComponentId::new(*n)).collect()
    }

    #[test]
    fn test_lookup_by_field_and_attribute() {
        let store = store();
        assert_eq!(
            store.lookup(&Selector::ComponentType, &"widget".into()),
            ids(&["a"])
        );
        assert_eq!(
            store.lookup(&Selector::Attribute("room".into()), &"kitchen".into()),
            ids(&["a", "b"])
        );
        assert_eq!(
            store.lookup(&Selector::Port, &AttributeValue::Integer(6001)),
            ids(&["b"])
        );
        assert!(store
            .lookup(&Selector::Attribute("colour".into()), &"red".into())
            .is_empty());
    }

    #[test]
    fn test_ordering_rules_scan_buckets() {
        let store = store();
        let high_port = Rule::new(Selector::Port, Comparison::Greater, 6000);
        assert_eq!(store.select(&high_port), ids(&["b"]));

        let warm = Rule::new(
            Selector::Attribute("temperature".into()),
            Comparison::GreaterOrEqual,
            20.5,
        );
        assert_eq!(store.select(&warm), ids(&["a"]));
    }

    #[test]
    fn test_membership_selectors() {
        let store = store();
        let has_update = Rule::new(Selector::Callback, Comparison::Equal, "update");
        assert_eq!(store.select(&has_update), ids(&["a"]));

        let lacks_history = Rule::new(Selector::Service, Comparison::Different, "history");
        assert_eq!(store.select(&lacks_history), ids(&["a"]));

        let ordered = Rule::new(Selector::Service, Comparison::Less, "history");
        assert!(store.select(&ordered).is_empty());
    }

    #[test]
    fn test_update_reindexes_and_leaves_no_stale_entries() {
        let mut store = store();
        let temperature = Selector::Attribute("temperature".into());

        let delta = Attributes::new().with(Attribute::new("temperature", 30));
        store
            .update(&ComponentId::new("a"), &delta, UpdateMode::Add)
            .unwrap();
        assert!(store
            .lookup(&temperature, &AttributeValue::Integer(21))
            .is_empty());
        assert_eq!(
            store.lookup(&temperature, &AttributeValue::Integer(30)),
            ids(&["a"])
        );

        let cleared = Attributes::new().with(Attribute::declared("humidity", AttributeType::Float));
        store
            .update(&ComponentId::new("a"), &cleared, UpdateMode::Replace)
            .unwrap();
        assert!(store.indexed_ids(&temperature).is_empty());

        store.remove(&ComponentId::new("a"));
        for selector in FIELDS.iter().chain([
            &Selector::Attribute("room".into()),
            &Selector::Callback,
            &Selector::Service,
        ]) {
            assert!(!store.indexed_ids(selector).contains(&ComponentId::new("a")));
        }
    }

    #[test]
    fn test_update_errors() {
        let mut store = store();
        let delta = Attributes::new().with(Attribute::new("temperature", 30));
        assert_eq!(
            store.update(&ComponentId::new("zzz"), &delta, UpdateMode::Add),
            Err(RegistryError::ComponentNotFound(ComponentId::new("zzz")))
        );

        let constant = Attributes::new().with(Attribute::new("room", "hall"));
        assert!(matches!(
            store.update(&ComponentId::new("a"), &constant, UpdateMode::Add),
            Err(RegistryError::ConstantAttribute { .. })
        ));
        assert_eq!(
            store.lookup(&Selector::Attribute("room".into()), &"kitchen".into()),
            ids(&["a", "b"])
        );
    }

    #[test]
    fn test_reinsert_replaces_previous() {
        let mut store = store();
        let previous = store
            .insert(ComponentDescription::new("a", ComponentType::Application))
            .unwrap();
        assert!(previous.is_some());
        assert_eq!(store.len(), 2);
        assert!(store
            .lookup(&Selector::ComponentType, &"widget".into())
            .is_empty());
        assert!(store.insert(ComponentDescription::new(" ", ComponentType::Widget)).is_err());
    }
}
