//! Conversion between predicate trees and the structured message tree.
//!
//! ```text
//! queryAnd
//! ├── queryRule
//! │   ├── selector { kind: "type" }
//! │   ├── comparison: "equal"
//! │   └── operand { type: "string", value: "widget" }
//! └── queryNot
//!     └── queryRule ...
//! ```
//!
//! Decoding assembles composites child by child through
//! [`QueryItem::add_child`], so arity violations surface as
//! [`QueryError`]s rather than panics.

use ctx_types::{AttributeType, AttributeValue, DataObject, ToDataObject};

use crate::error::{QueryError, QueryResult};
use crate::item::{QueryItem, Rule};
use crate::selector::{Comparison, Selector};

const RULE: &str = "queryRule";
const AND: &str = "queryAnd";
const OR: &str = "queryOr";
const NOT: &str = "queryNot";
const ELSE: &str = "queryElse";

impl ToDataObject for Rule {
    fn to_data_object(&self) -> DataObject {
        let mut selector =
            DataObject::new("selector").with_child(DataObject::leaf("kind", self.selector.kind()));
        if let Selector::Attribute(name) = &self.selector {
            selector.push(DataObject::leaf("name", name));
        }

        DataObject::new(RULE)
            .with_child(selector)
            .with_child(DataObject::leaf("comparison", self.comparison))
            .with_child(
                DataObject::new("operand")
                    .with_child(DataObject::leaf("type", self.operand.attribute_type()))
                    .with_child(DataObject::leaf("value", &self.operand)),
            )
    }
}

impl TryFrom<&DataObject> for Rule {
    type Error = QueryError;

    fn try_from(data: &DataObject) -> QueryResult<Self> {
        data.expect_name(RULE)?;

        let selector_node = data.require_child("selector")?;
        let selector = Selector::from_kind(
            selector_node.require_value("kind")?,
            selector_node.value_of("name"),
        )?;

        let comparison = Comparison::parse(data.require_value("comparison")?)?;

        let operand_node = data.require_child("operand")?;
        let operand_type = match operand_node.value_of("type") {
            Some(raw) => AttributeType::parse(raw)?,
            None => AttributeType::String,
        };
        let operand = AttributeValue::parse(operand_type, operand_node.require_value("value")?)?;

        Ok(Rule {
            selector,
            comparison,
            operand,
        })
    }
}

impl ToDataObject for QueryItem {
    fn to_data_object(&self) -> DataObject {
        match self {
            QueryItem::Rule(rule) => rule.to_data_object(),
            QueryItem::And(children) => composite(AND, children),
            QueryItem::Or(children) => composite(OR, children),
            QueryItem::Not(child) => DataObject::new(NOT).with_child(child.to_data_object()),
            QueryItem::Else(children) => composite(ELSE, children),
        }
    }
}

fn composite(tag: &str, children: &[QueryItem]) -> DataObject {
    DataObject::new(tag).with_children(children.iter().map(ToDataObject::to_data_object))
}

impl TryFrom<&DataObject> for QueryItem {
    type Error = QueryError;

    fn try_from(data: &DataObject) -> QueryResult<Self> {
        let mut item = match data.name.as_str() {
            RULE => return Rule::try_from(data).map(QueryItem::Rule),
            AND => QueryItem::And(Vec::new()),
            OR => QueryItem::Or(Vec::new()),
            ELSE => QueryItem::Else(Vec::new()),
            NOT => {
                let mut children = data.children.iter();
                let child = children.next().ok_or(QueryError::NotArity)?;
                let mut item = QueryItem::not(QueryItem::try_from(child)?);
                for extra in children {
                    item.add_child(QueryItem::try_from(extra)?)?;
                }
                return Ok(item);
            }
            other => return Err(QueryError::UnknownNode(other.to_string())),
        };

        for child in &data.children {
            item.add_child(QueryItem::try_from(child)?)?;
        }
        Ok(item)
    }
}

impl QueryItem {
    /// Decode and validate in one step.
    pub fn decode(data: &DataObject) -> QueryResult<Self> {
        let item = QueryItem::try_from(data)?;
        item.validate()?;
        Ok(item)
    }
}
