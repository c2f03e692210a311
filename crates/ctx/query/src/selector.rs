//! Leaf selectors and comparison operators.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use ctx_types::{AttributeValue, ComponentDescription, DecodeError, DecodeResult};
use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;

/// What a leaf rule looks at in a component description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    Id,
    ComponentType,
    Classname,
    Hostname,
    HostAddress,
    Port,
    Version,
    /// Named attribute; non-constant values shadow constant ones.
    Attribute(String),
    /// Membership in the component's callback names.
    Callback,
    /// Membership in the component's service names.
    Service,
}

/// Value a selector resolves to for one description.
#[derive(Debug)]
pub enum Resolved<'a> {
    Value(AttributeValue),
    Set(&'a BTreeSet<String>),
    Missing,
}

impl Selector {
    pub fn kind(&self) -> &'static str {
        match self {
            Selector::Id => "id",
            Selector::ComponentType => "type",
            Selector::Classname => "classname",
            Selector::Hostname => "hostname",
            Selector::HostAddress => "hostAddress",
            Selector::Port => "port",
            Selector::Version => "version",
            Selector::Attribute(_) => "attribute",
            Selector::Callback => "callback",
            Selector::Service => "service",
        }
    }

    /// Build a selector from its wire kind and optional attribute name.
    pub fn from_kind(kind: &str, name: Option<&str>) -> DecodeResult<Self> {
        let selector = match kind.trim() {
            "id" => Selector::Id,
            "type" => Selector::ComponentType,
            "classname" => Selector::Classname,
            "hostname" => Selector::Hostname,
            "hostAddress" => Selector::HostAddress,
            "port" => Selector::Port,
            "version" => Selector::Version,
            "attribute" => Selector::Attribute(
                name.ok_or_else(|| DecodeError::MissingField("selector.name".to_string()))?
                    .to_string(),
            ),
            "callback" => Selector::Callback,
            "service" => Selector::Service,
            other => {
                return Err(DecodeError::UnknownVariant {
                    kind: "selector",
                    value: other.to_string(),
                })
            }
        };
        Ok(selector)
    }

    pub fn resolve<'a>(&self, description: &'a ComponentDescription) -> Resolved<'a> {
        match self {
            Selector::Id => Resolved::Value(description.id.as_str().into()),
            Selector::ComponentType => {
                Resolved::Value(description.component_type.as_str().into())
            }
            Selector::Classname => Resolved::Value(description.classname.as_str().into()),
            Selector::Hostname => Resolved::Value(description.hostname.as_str().into()),
            Selector::HostAddress => Resolved::Value(description.host_address.as_str().into()),
            Selector::Port => Resolved::Value(AttributeValue::Integer(description.port as i64)),
            Selector::Version => Resolved::Value(description.version.as_str().into()),
            Selector::Attribute(name) => match description.attribute(name) {
                Some(attribute) => match &attribute.value {
                    Some(value) => Resolved::Value(value.clone()),
                    None => Resolved::Missing,
                },
                None => Resolved::Missing,
            },
            Selector::Callback => Resolved::Set(&description.callbacks),
            Selector::Service => Resolved::Set(&description.services),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Attribute(name) => write!(f, "attribute:{}", name),
            other => f.write_str(other.kind()),
        }
    }
}

/// Leaf comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    Different,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Equal => "equal",
            Comparison::Different => "different",
            Comparison::Greater => "greater",
            Comparison::GreaterOrEqual => "greaterOrEqual",
            Comparison::Less => "less",
            Comparison::LessOrEqual => "lessOrEqual",
        }
    }

    pub fn parse(raw: &str) -> DecodeResult<Self> {
        match raw.trim() {
            "equal" | "=" | "==" => Ok(Comparison::Equal),
            "different" | "!=" | "<>" => Ok(Comparison::Different),
            "greater" | ">" => Ok(Comparison::Greater),
            "greaterOrEqual" | ">=" => Ok(Comparison::GreaterOrEqual),
            "less" | "<" => Ok(Comparison::Less),
            "lessOrEqual" | "<=" => Ok(Comparison::LessOrEqual),
            other => Err(DecodeError::UnknownVariant {
                kind: "comparison",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_ordering(&self) -> bool {
        !matches!(self, Comparison::Equal | Comparison::Different)
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Equal => ordering == Ordering::Equal,
            Comparison::Different => ordering != Ordering::Equal,
            Comparison::Greater => ordering == Ordering::Greater,
            Comparison::GreaterOrEqual => ordering != Ordering::Less,
            Comparison::Less => ordering == Ordering::Less,
            Comparison::LessOrEqual => ordering != Ordering::Greater,
        }
    }

    /// Compare a selected value (left) with an operand (right).
    ///
    /// Strings compare with strings, booleans with booleans (equality only),
    /// integers and floats with each other. Anything else is indeterminate.
    pub fn evaluate(&self, value: &AttributeValue, operand: &AttributeValue) -> Outcome {
        let ordering = match (value, operand) {
            (AttributeValue::String(a), AttributeValue::String(b)) => Some(a.cmp(b)),
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => Some(a.cmp(b)),
            (AttributeValue::Boolean(a), AttributeValue::Boolean(b)) => {
                if self.is_ordering() {
                    None
                } else {
                    Some(a.cmp(b))
                }
            }
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        };

        match ordering {
            Some(ordering) => Outcome::from_bool(self.holds(ordering)),
            None => Outcome::Indeterminate,
        }
    }

    /// Membership test for set-valued selectors.
    pub fn evaluate_membership(&self, contains: bool, operand: &AttributeValue) -> Outcome {
        if operand.as_str().is_none() {
            return Outcome::Indeterminate;
        }
        match self {
            Comparison::Equal => Outcome::from_bool(contains),
            Comparison::Different => Outcome::from_bool(!contains),
            _ => Outcome::Indeterminate,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cross_type_comparison() {
        let value = AttributeValue::Integer(21);
        assert_eq!(
            Comparison::Less.evaluate(&value, &AttributeValue::Float(21.5)),
            Outcome::True
        );
        assert_eq!(
            Comparison::Equal.evaluate(&value, &AttributeValue::Float(21.0)),
            Outcome::True
        );
        assert_eq!(
            Comparison::GreaterOrEqual.evaluate(&value, &AttributeValue::Integer(22)),
            Outcome::False
        );
    }

    #[test]
    fn test_mistyped_operand_is_indeterminate() {
        let value = AttributeValue::from("kitchen");
        assert_eq!(
            Comparison::Equal.evaluate(&value, &AttributeValue::Integer(3)),
            Outcome::Indeterminate
        );
        assert_eq!(
            Comparison::Less.evaluate(&AttributeValue::Float(f64::NAN), &AttributeValue::Float(1.0)),
            Outcome::Indeterminate
        );
    }

    #[test]
    fn test_boolean_ordering_is_indeterminate() {
        let value = AttributeValue::Boolean(true);
        assert_eq!(
            Comparison::Equal.evaluate(&value, &AttributeValue::Boolean(true)),
            Outcome::True
        );
        assert_eq!(
            Comparison::Greater.evaluate(&value, &AttributeValue::Boolean(false)),
            Outcome::Indeterminate
        );
    }

    #[test]
    fn test_membership() {
        let name = AttributeValue::from("update");
        assert_eq!(Comparison::Equal.evaluate_membership(true, &name), Outcome::True);
        assert_eq!(Comparison::Different.evaluate_membership(true, &name), Outcome::False);
        assert_eq!(
            Comparison::Less.evaluate_membership(true, &name),
            Outcome::Indeterminate
        );
        assert_eq!(
            Comparison::Equal.evaluate_membership(true, &AttributeValue::Integer(1)),
            Outcome::Indeterminate
        );
    }

    #[test]
    fn test_comparison_symbols() {
        assert_eq!(Comparison::parse(">=").unwrap(), Comparison::GreaterOrEqual);
        assert_eq!(Comparison::parse("different").unwrap(), Comparison::Different);
        assert!(Comparison::parse("like").is_err());
    }
}
