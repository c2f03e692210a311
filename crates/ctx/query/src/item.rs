//! The predicate tree.

use std::collections::BTreeSet;

use ctx_types::{AttributeValue, ComponentDescription, ComponentId, ComponentType};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::lookup::IndexLookup;
use crate::outcome::Outcome;
use crate::selector::{Comparison, Resolved, Selector};

/// Leaf condition: `selector <comparison> operand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub selector: Selector,
    pub comparison: Comparison,
    pub operand: AttributeValue,
}

impl Rule {
    pub fn new(
        selector: Selector,
        comparison: Comparison,
        operand: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            selector,
            comparison,
            operand: operand.into(),
        }
    }

    pub fn matches(&self, description: &ComponentDescription) -> Outcome {
        match self.selector.resolve(description) {
            Resolved::Value(value) => self.evaluate_value(&value),
            Resolved::Set(names) => {
                let contains = self
                    .operand
                    .as_str()
                    .map(|name| names.contains(name))
                    .unwrap_or(false);
                self.evaluate_membership(contains)
            }
            Resolved::Missing => Outcome::Indeterminate,
        }
    }

    /// Evaluate against a value already selected from a description.
    pub fn evaluate_value(&self, value: &AttributeValue) -> Outcome {
        self.comparison.evaluate(value, &self.operand)
    }

    /// Evaluate a membership selector given whether the set contains the operand.
    pub fn evaluate_membership(&self, contains: bool) -> Outcome {
        self.comparison.evaluate_membership(contains, &self.operand)
    }

    fn validate(&self) -> QueryResult<()> {
        match &self.selector {
            Selector::Attribute(name) if name.trim().is_empty() => {
                Err(QueryError::UnnamedAttribute)
            }
            _ => Ok(()),
        }
    }
}

/// A node of the predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryItem {
    Rule(Rule),
    And(Vec<QueryItem>),
    Or(Vec<QueryItem>),
    Not(Box<QueryItem>),
    /// None of the children holds: `NOT(OR(children))`.
    Else(Vec<QueryItem>),
}

impl QueryItem {
    pub fn rule(
        selector: Selector,
        comparison: Comparison,
        operand: impl Into<AttributeValue>,
    ) -> Self {
        QueryItem::Rule(Rule::new(selector, comparison, operand))
    }

    pub fn type_is(component_type: ComponentType) -> Self {
        Self::rule(
            Selector::ComponentType,
            Comparison::Equal,
            component_type.as_str(),
        )
    }

    pub fn id_is(id: impl Into<String>) -> Self {
        Self::rule(Selector::Id, Comparison::Equal, AttributeValue::String(id.into()))
    }

    pub fn attribute(
        name: impl Into<String>,
        comparison: Comparison,
        operand: impl Into<AttributeValue>,
    ) -> Self {
        Self::rule(Selector::Attribute(name.into()), comparison, operand)
    }

    pub fn attribute_equals(name: impl Into<String>, operand: impl Into<AttributeValue>) -> Self {
        Self::attribute(name, Comparison::Equal, operand)
    }

    pub fn and(children: Vec<QueryItem>) -> Self {
        QueryItem::And(children)
    }

    pub fn or(children: Vec<QueryItem>) -> Self {
        QueryItem::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: QueryItem) -> Self {
        QueryItem::Not(Box::new(child))
    }

    /// ELSE node: holds when none of `children` holds.
    pub fn none_of(children: Vec<QueryItem>) -> Self {
        QueryItem::Else(children)
    }

    /// Node tag used in messages and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryItem::Rule(_) => "rule",
            QueryItem::And(_) => "and",
            QueryItem::Or(_) => "or",
            QueryItem::Not(_) => "not",
            QueryItem::Else(_) => "else",
        }
    }

    /// Append a child to a composite node.
    ///
    /// Rules take no children; a NOT node that already has its child takes
    /// no second one.
    pub fn add_child(&mut self, child: QueryItem) -> QueryResult<()> {
        match self {
            QueryItem::And(children) | QueryItem::Or(children) | QueryItem::Else(children) => {
                children.push(child);
                Ok(())
            }
            QueryItem::Not(_) => Err(QueryError::NotArity),
            QueryItem::Rule(_) => Err(QueryError::RuleHasNoChildren),
        }
    }

    /// Builder form of [`QueryItem::add_child`].
    pub fn with_child(mut self, child: QueryItem) -> QueryResult<Self> {
        self.add_child(child)?;
        Ok(self)
    }

    /// Check the tree is structurally sound: composites are non-empty and
    /// attribute selectors are named.
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            QueryItem::Rule(rule) => rule.validate(),
            QueryItem::And(children) | QueryItem::Or(children) | QueryItem::Else(children) => {
                if children.is_empty() {
                    return Err(QueryError::EmptyComposite(self.kind()));
                }
                children.iter().try_for_each(QueryItem::validate)
            }
            QueryItem::Not(child) => child.validate(),
        }
    }

    /// Evaluate against a single description.
    pub fn matches(&self, description: &ComponentDescription) -> Outcome {
        match self {
            QueryItem::Rule(rule) => rule.matches(description),
            QueryItem::And(children) => {
                Outcome::all(children.iter().map(|c| c.matches(description)))
            }
            QueryItem::Or(children) => {
                Outcome::any(children.iter().map(|c| c.matches(description)))
            }
            QueryItem::Not(child) => child.matches(description).complement(),
            QueryItem::Else(children) => {
                Outcome::any(children.iter().map(|c| c.matches(description))).complement()
            }
        }
    }

    /// Evaluate against a whole registry through its indices.
    pub fn search(&self, index: &dyn IndexLookup) -> BTreeSet<ComponentId> {
        match self {
            QueryItem::Rule(rule) => index.select(rule),
            QueryItem::And(children) => {
                let mut iter = children.iter();
                let mut result = match iter.next() {
                    Some(first) => first.search(index),
                    None => return index.all_ids(),
                };
                for child in iter {
                    if result.is_empty() {
                        break;
                    }
                    let next = child.search(index);
                    result.retain(|id| next.contains(id));
                }
                result
            }
            QueryItem::Or(children) => union(children, index),
            QueryItem::Not(child) => {
                let excluded = child.search(index);
                index
                    .all_ids()
                    .into_iter()
                    .filter(|id| !excluded.contains(id))
                    .collect()
            }
            QueryItem::Else(children) => {
                let excluded = union(children, index);
                index
                    .all_ids()
                    .into_iter()
                    .filter(|id| !excluded.contains(id))
                    .collect()
            }
        }
    }
}

fn union(children: &[QueryItem], index: &dyn IndexLookup) -> BTreeSet<ComponentId> {
    let mut result = BTreeSet::new();
    for child in children {
        result.extend(child.search(index));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_types::{Attribute, AttributeType};

    /// Scans every description; enough to pin the search combinators.
    struct ScanIndex(Vec<ComponentDescription>);

    impl IndexLookup for ScanIndex {
        fn all_ids(&self) -> BTreeSet<ComponentId> {
            self.0.iter().map(|d| d.id.clone()).collect()
        }

        fn select(&self, rule: &Rule) -> BTreeSet<ComponentId> {
            self.0
                .iter()
                .filter(|d| rule.matches(d).is_true())
                .map(|d| d.id.clone())
                .collect()
        }
    }

    fn fixture() -> ScanIndex {
        ScanIndex(vec![
            ComponentDescription::new("a", ComponentType::Widget)
                .with_constant(Attribute::new("room", "kitchen")),
            ComponentDescription::new("b", ComponentType::Server)
                .with_constant(Attribute::new("room", "kitchen")),
            ComponentDescription::new("c", ComponentType::Widget)
                .with_constant(Attribute::new("room", "hall"))
                .with_attribute(Attribute::declared("temperature", AttributeType::Integer)),
        ])
    }

    fn ids(names: &[&str]) -> BTreeSet<ComponentId> {
        names.iter().map(|n| ComponentId::new(*n)).collect()
    }

    #[test]
    fn test_and_not_search() {
        let index = fixture();
        let kitchen_widgets = QueryItem::and(vec![
            QueryItem::type_is(ComponentType::Widget),
            QueryItem::attribute_equals("room", "kitchen"),
        ]);
        assert_eq!(kitchen_widgets.search(&index), ids(&["a"]));

        let not_widget = QueryItem::not(QueryItem::type_is(ComponentType::Widget));
        assert_eq!(not_widget.search(&index), ids(&["b"]));
    }

    #[test]
    fn test_declared_attribute_is_indeterminate() {
        let index = fixture();
        let warm = QueryItem::attribute("temperature", Comparison::Greater, 20);
        assert_eq!(warm.matches(&index.0[2]), Outcome::Indeterminate);
        assert_eq!(warm.matches(&index.0[0]), Outcome::Indeterminate);
        assert!(warm.search(&index).is_empty());

        let either = QueryItem::or(vec![warm.clone(), QueryItem::id_is("c")]);
        assert_eq!(either.matches(&index.0[2]), Outcome::True);
        assert_eq!(either.matches(&index.0[0]), Outcome::Indeterminate);
    }

    #[test]
    fn test_else_is_negated_or() {
        let index = fixture();
        let children = vec![QueryItem::id_is("a"), QueryItem::id_is("b")];
        let none = QueryItem::none_of(children.clone());
        let negated = QueryItem::not(QueryItem::or(children));
        for description in &index.0 {
            assert_eq!(none.matches(description), negated.matches(description));
        }
        assert_eq!(none.search(&index), ids(&["c"]));
    }

    #[test]
    fn test_incremental_assembly() {
        let mut query = QueryItem::and(Vec::new());
        assert_eq!(query.validate(), Err(QueryError::EmptyComposite("and")));

        query.add_child(QueryItem::type_is(ComponentType::Widget)).unwrap();
        assert!(query.validate().is_ok());

        let mut not = QueryItem::not(QueryItem::id_is("a"));
        assert_eq!(not.add_child(QueryItem::id_is("b")), Err(QueryError::NotArity));

        let mut rule = QueryItem::id_is("a");
        assert_eq!(
            rule.add_child(QueryItem::id_is("b")),
            Err(QueryError::RuleHasNoChildren)
        );
    }

    #[test]
    fn test_unnamed_attribute_is_invalid() {
        let query = QueryItem::attribute(" ", Comparison::Equal, "x");
        assert_eq!(query.validate(), Err(QueryError::UnnamedAttribute));
    }
}
