//! Typed component attributes.
//!
//! An attribute either declares a name and a type (the component exposes
//! it but has no current value), or carries a typed value. On the wire the
//! value is a string interpreted by the declared type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::message::{DataObject, DecodeError, DecodeResult, FromDataObject, ToDataObject};

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
        }
    }

    pub fn parse(raw: &str) -> DecodeResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(AttributeType::String),
            "integer" | "int" | "long" | "short" => Ok(AttributeType::Integer),
            "float" | "double" => Ok(AttributeType::Float),
            "boolean" | "bool" => Ok(AttributeType::Boolean),
            other => Err(DecodeError::UnknownVariant {
                kind: "attribute type",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeType::Integer | AttributeType::Float)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl AttributeValue {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Integer(_) => AttributeType::Integer,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::Boolean(_) => AttributeType::Boolean,
        }
    }

    /// Interpret a wire string according to a declared type.
    pub fn parse(attribute_type: AttributeType, raw: &str) -> DecodeResult<Self> {
        let invalid = || DecodeError::InvalidValue {
            field: format!("{} value", attribute_type),
            value: raw.to_string(),
        };
        match attribute_type {
            AttributeType::String => Ok(AttributeValue::String(raw.to_string())),
            AttributeType::Integer => raw
                .trim()
                .parse()
                .map(AttributeValue::Integer)
                .map_err(|_| invalid()),
            AttributeType::Float => raw
                .trim()
                .parse()
                .map(AttributeValue::Float)
                .map_err(|_| invalid()),
            AttributeType::Boolean => raw
                .trim()
                .parse()
                .map(AttributeValue::Boolean)
                .map_err(|_| invalid()),
        }
    }

    /// Numeric view, for integer/float comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(v) => f.write_str(v),
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

/// A named, typed attribute, optionally carrying a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    pub value: Option<AttributeValue>,
}

impl Attribute {
    /// Attribute with a value; the type follows the value.
    pub fn new(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            attribute_type: value.attribute_type(),
            value: Some(value),
        }
    }

    /// Name-only attribute: a type declaration without a current value.
    pub fn declared(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            value: None,
        }
    }
}

impl ToDataObject for Attribute {
    fn to_data_object(&self) -> DataObject {
        let mut data = DataObject::new("attribute")
            .with_child(DataObject::leaf("name", &self.name))
            .with_child(DataObject::leaf("type", self.attribute_type));
        if let Some(value) = &self.value {
            data.push(DataObject::leaf("value", value));
        }
        data
    }
}

impl FromDataObject for Attribute {
    fn from_data_object(data: &DataObject) -> DecodeResult<Self> {
        data.expect_name("attribute")?;
        let name = data.require_value("name")?.to_string();
        if name.trim().is_empty() {
            return Err(DecodeError::InvalidValue {
                field: "attribute.name".to_string(),
                value: name,
            });
        }
        let attribute_type = match data.value_of("type") {
            Some(raw) => AttributeType::parse(raw)?,
            None => AttributeType::String,
        };
        let value = data
            .value_of("value")
            .map(|raw| AttributeValue::parse(attribute_type, raw))
            .transpose()?;
        Ok(Self {
            name,
            attribute_type,
            value,
        })
    }
}

/// Ordered name → attribute map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes(BTreeMap<String, Attribute>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by name, returning the previous attribute.
    pub fn insert(&mut self, attribute: Attribute) -> Option<Attribute> {
        self.0.insert(attribute.name.clone(), attribute)
    }

    /// Builder form of [`Attributes::insert`].
    pub fn with(mut self, attribute: Attribute) -> Self {
        self.insert(attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// ADD semantics: every attribute in `delta` overwrites or extends.
    pub fn merge(&mut self, delta: &Attributes) {
        for attribute in delta.iter() {
            self.insert(attribute.clone());
        }
    }

    /// REPLACE semantics: clear, then take `delta` wholesale.
    pub fn replace(&mut self, delta: &Attributes) {
        self.0.clear();
        self.merge(delta);
    }

    /// Encode under the given tag (`constantAttributes`, `nonConstantAttributes`, ...).
    pub fn to_data_object_named(&self, tag: &str) -> DataObject {
        DataObject::new(tag).with_children(self.iter().map(ToDataObject::to_data_object))
    }

    /// Decode the `attribute` children of a node, whatever its tag.
    pub fn from_data_object(data: &DataObject) -> DecodeResult<Self> {
        let mut attributes = Attributes::new();
        for child in data.children_named("attribute") {
            attributes.insert(Attribute::from_data_object(child)?);
        }
        Ok(attributes)
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        let mut attributes = Attributes::new();
        for attribute in iter {
            attributes.insert(attribute);
        }
        attributes
    }
}
