//! Structured message tree.
//!
//! Every protocol payload converts to and from a [`DataObject`]: a named
//! node with an optional textual value and an ordered list of children.
//! Wire codecs only ever see this tree, so adding a payload never touches
//! the transport.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A node of the structured message tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
    /// Tag naming what this node carries.
    pub name: String,

    /// Textual value for leaf nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Ordered child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DataObject>,
}

impl DataObject {
    /// Create an empty node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            children: Vec::new(),
        }
    }

    /// Create a leaf node carrying a value.
    pub fn leaf(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: Some(value.to_string()),
            children: Vec::new(),
        }
    }

    /// Builder: append one child.
    pub fn with_child(mut self, child: DataObject) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: append several children, preserving order.
    pub fn with_children(mut self, children: impl IntoIterator<Item = DataObject>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn push(&mut self, child: DataObject) {
        self.children.push(child);
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&DataObject> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name, in order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DataObject> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Value of the first child with the given name.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.value.as_deref())
    }

    pub fn require_child(&self, name: &str) -> DecodeResult<&DataObject> {
        self.child(name)
            .ok_or_else(|| DecodeError::MissingField(format!("{}.{}", self.name, name)))
    }

    pub fn require_value(&self, name: &str) -> DecodeResult<&str> {
        self.value_of(name)
            .ok_or_else(|| DecodeError::MissingField(format!("{}.{}", self.name, name)))
    }

    /// Parse the value of a required child.
    pub fn parse_value<T: FromStr>(&self, name: &str) -> DecodeResult<T> {
        let raw = self.require_value(name)?;
        raw.trim().parse().map_err(|_| DecodeError::InvalidValue {
            field: format!("{}.{}", self.name, name),
            value: raw.to_string(),
        })
    }

    /// Parse the value of an optional child.
    pub fn parse_optional<T: FromStr>(&self, name: &str) -> DecodeResult<Option<T>> {
        match self.value_of(name) {
            None => Ok(None),
            Some(_) => self.parse_value(name).map(Some),
        }
    }

    /// Fail unless this node carries the expected tag.
    pub fn expect_name(&self, expected: &str) -> DecodeResult<()> {
        if self.name == expected {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedNode {
                expected: expected.to_string(),
                found: self.name.clone(),
            })
        }
    }
}

/// Conversion into the structured message tree.
pub trait ToDataObject {
    fn to_data_object(&self) -> DataObject;
}

/// Conversion out of the structured message tree.
pub trait FromDataObject: Sized {
    fn from_data_object(data: &DataObject) -> DecodeResult<Self>;
}

/// Errors raised while decoding a [`DataObject`] into a typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected node: expected '{expected}', found '{found}'")]
    UnexpectedNode { expected: String, found: String },

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Result type for message decoding
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
