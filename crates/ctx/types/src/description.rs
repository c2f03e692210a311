//! Component descriptions.
//!
//! A [`ComponentDescription`] is the stored record of one registered
//! participant. Its `id` never changes once registered; its non-constant
//! attributes are mutated by update messages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::attribute::{Attribute, Attributes};
use crate::ids::ComponentId;
use crate::message::{DataObject, DecodeError, DecodeResult, FromDataObject, ToDataObject};

/// Kind of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Application,
    Widget,
    Server,
    Interpreter,
    Discoverer,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Application => "application",
            ComponentType::Widget => "widget",
            ComponentType::Server => "server",
            ComponentType::Interpreter => "interpreter",
            ComponentType::Discoverer => "discoverer",
        }
    }

    pub fn parse(raw: &str) -> DecodeResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "application" => Ok(ComponentType::Application),
            "widget" => Ok(ComponentType::Widget),
            "server" => Ok(ComponentType::Server),
            "interpreter" => Ok(ComponentType::Interpreter),
            "discoverer" => Ok(ComponentType::Discoverer),
            other => Err(DecodeError::UnknownVariant {
                kind: "component type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an update message applies its attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Merge: overwrite named attributes, keep the others.
    #[default]
    Add,
    /// Clear all non-constant attributes, then set the given ones.
    Replace,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Add => "add",
            UpdateMode::Replace => "replace",
        }
    }

    pub fn parse(raw: &str) -> DecodeResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(UpdateMode::Add),
            "replace" => Ok(UpdateMode::Replace),
            other => Err(DecodeError::UnknownVariant {
                kind: "update mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Full description of a registered component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescription {
    /// Globally unique id, immutable once registered.
    pub id: ComponentId,

    pub classname: String,
    pub hostname: String,
    pub host_address: String,
    pub port: u16,
    pub component_type: ComponentType,
    pub version: String,

    /// Attributes fixed for the component's lifetime (e.g. location).
    pub constant_attributes: Attributes,

    /// Attributes that change over time; the subject of most predicates.
    pub non_constant_attributes: Attributes,

    pub callbacks: BTreeSet<String>,
    pub services: BTreeSet<String>,

    /// Current listeners of this component.
    pub subscribers: BTreeSet<String>,
}

impl ComponentDescription {
    pub fn new(id: impl Into<ComponentId>, component_type: ComponentType) -> Self {
        Self {
            id: id.into(),
            classname: String::new(),
            hostname: "localhost".to_string(),
            host_address: "127.0.0.1".to_string(),
            port: 0,
            component_type,
            version: "1.0".to_string(),
            constant_attributes: Attributes::new(),
            non_constant_attributes: Attributes::new(),
            callbacks: BTreeSet::new(),
            services: BTreeSet::new(),
            subscribers: BTreeSet::new(),
        }
    }

    pub fn with_classname(mut self, classname: impl Into<String>) -> Self {
        self.classname = classname.into();
        self
    }

    pub fn with_endpoint(
        mut self,
        hostname: impl Into<String>,
        host_address: impl Into<String>,
        port: u16,
    ) -> Self {
        self.hostname = hostname.into();
        self.host_address = host_address.into();
        self.port = port;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_constant(mut self, attribute: Attribute) -> Self {
        self.constant_attributes.insert(attribute);
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.non_constant_attributes.insert(attribute);
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callbacks.insert(callback.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.services.insert(service.into());
        self
    }

    /// Resolve an attribute by name; non-constant values shadow constant ones.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.non_constant_attributes
            .get(name)
            .or_else(|| self.constant_attributes.get(name))
    }

    /// Every attribute as seen by [`ComponentDescription::attribute`].
    pub fn resolved_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.non_constant_attributes.iter().chain(
            self.constant_attributes
                .iter()
                .filter(|a| !self.non_constant_attributes.contains(&a.name)),
        )
    }

    /// Apply an update delta to the non-constant attributes.
    pub fn apply_update(&mut self, delta: &Attributes, mode: UpdateMode) {
        match mode {
            UpdateMode::Add => self.non_constant_attributes.merge(delta),
            UpdateMode::Replace => self.non_constant_attributes.replace(delta),
        }
    }

    /// Basic projection returned by queries and basic notifications.
    pub fn basic(&self) -> ComponentSummary {
        ComponentSummary {
            id: self.id.clone(),
            classname: self.classname.clone(),
            hostname: self.hostname.clone(),
            host_address: self.host_address.clone(),
            port: self.port,
            component_type: self.component_type,
        }
    }
}

impl ToDataObject for ComponentDescription {
    fn to_data_object(&self) -> DataObject {
        DataObject::new("component")
            .with_child(DataObject::leaf("id", &self.id))
            .with_child(DataObject::leaf("classname", &self.classname))
            .with_child(DataObject::leaf("hostname", &self.hostname))
            .with_child(DataObject::leaf("hostAddress", &self.host_address))
            .with_child(DataObject::leaf("port", self.port))
            .with_child(DataObject::leaf("type", self.component_type))
            .with_child(DataObject::leaf("version", &self.version))
            .with_child(
                self.constant_attributes
                    .to_data_object_named("constantAttributes"),
            )
            .with_child(
                self.non_constant_attributes
                    .to_data_object_named("nonConstantAttributes"),
            )
            .with_child(names_to_data_object("callbacks", "callback", &self.callbacks))
            .with_child(names_to_data_object("services", "service", &self.services))
            .with_child(names_to_data_object(
                "subscribers",
                "subscriber",
                &self.subscribers,
            ))
    }
}

impl FromDataObject for ComponentDescription {
    fn from_data_object(data: &DataObject) -> DecodeResult<Self> {
        data.expect_name("component")?;

        let id = ComponentId::new(data.require_value("id")?);
        if id.is_empty() {
            return Err(DecodeError::InvalidValue {
                field: "component.id".to_string(),
                value: id.to_string(),
            });
        }

        let component_type = ComponentType::parse(data.require_value("type")?)?;
        let mut description = ComponentDescription::new(id, component_type);

        if let Some(classname) = data.value_of("classname") {
            description.classname = classname.to_string();
        }
        if let Some(hostname) = data.value_of("hostname") {
            description.hostname = hostname.to_string();
        }
        if let Some(address) = data.value_of("hostAddress") {
            description.host_address = address.to_string();
        }
        if let Some(port) = data.parse_optional("port")? {
            description.port = port;
        }
        if let Some(version) = data.value_of("version") {
            description.version = version.to_string();
        }
        if let Some(node) = data.child("constantAttributes") {
            description.constant_attributes = Attributes::from_data_object(node)?;
        }
        if let Some(node) = data.child("nonConstantAttributes") {
            description.non_constant_attributes = Attributes::from_data_object(node)?;
        }
        description.callbacks = names_from_data_object(data, "callbacks", "callback");
        description.services = names_from_data_object(data, "services", "service");
        description.subscribers = names_from_data_object(data, "subscribers", "subscriber");

        Ok(description)
    }
}

fn names_to_data_object(tag: &str, item: &str, names: &BTreeSet<String>) -> DataObject {
    DataObject::new(tag).with_children(names.iter().map(|n| DataObject::leaf(item, n)))
}

fn names_from_data_object(data: &DataObject, tag: &str, item: &str) -> BTreeSet<String> {
    data.child(tag)
        .map(|node| {
            node.children_named(item)
                .filter_map(|c| c.value.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Basic summary of a component: identity and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub id: ComponentId,
    pub classname: String,
    pub hostname: String,
    pub host_address: String,
    pub port: u16,
    pub component_type: ComponentType,
}

impl ToDataObject for ComponentSummary {
    fn to_data_object(&self) -> DataObject {
        DataObject::new("componentSummary")
            .with_child(DataObject::leaf("id", &self.id))
            .with_child(DataObject::leaf("classname", &self.classname))
            .with_child(DataObject::leaf("hostname", &self.hostname))
            .with_child(DataObject::leaf("hostAddress", &self.host_address))
            .with_child(DataObject::leaf("port", self.port))
            .with_child(DataObject::leaf("type", self.component_type))
    }
}

impl FromDataObject for ComponentSummary {
    fn from_data_object(data: &DataObject) -> DecodeResult<Self> {
        data.expect_name("componentSummary")?;
        Ok(Self {
            id: ComponentId::new(data.require_value("id")?),
            classname: data.value_of("classname").unwrap_or_default().to_string(),
            hostname: data.require_value("hostname")?.to_string(),
            host_address: data.require_value("hostAddress")?.to_string(),
            port: data.parse_value("port")?,
            component_type: ComponentType::parse(data.require_value("type")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeType, AttributeValue};

    fn kitchen_widget() -> ComponentDescription {
        ComponentDescription::new("widget-1", ComponentType::Widget)
            .with_classname("TemperatureWidget")
            .with_endpoint("sensor-host", "10.0.0.7", 5001)
            .with_constant(Attribute::new("room", "kitchen"))
            .with_attribute(Attribute::new("temperature", 21))
            .with_attribute(Attribute::declared("humidity", AttributeType::Float))
            .with_callback("update")
            .with_service("calibrate")
    }

    #[test]
    fn test_description_wire_form() {
        let description = kitchen_widget();
        let decoded =
            ComponentDescription::from_data_object(&description.to_data_object()).unwrap();
        assert_eq!(decoded, description);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut data = kitchen_widget().to_data_object();
        for child in data.children.iter_mut() {
            if child.name == "type" {
                child.value = Some("toaster".to_string());
            }
        }
        assert!(matches!(
            ComponentDescription::from_data_object(&data),
            Err(DecodeError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_non_constant_shadows_constant() {
        let description = kitchen_widget().with_attribute(Attribute::new("room", "hall"));
        assert_eq!(
            description.attribute("room").unwrap().value,
            Some(AttributeValue::from("hall"))
        );
        let names: Vec<_> = description
            .resolved_attributes()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names.iter().filter(|n| **n == "room").count(), 1);
    }

    #[test]
    fn test_apply_update_modes() {
        let mut description = kitchen_widget();
        let delta = Attributes::new().with(Attribute::new("temperature", 25));

        description.apply_update(&delta, UpdateMode::Add);
        assert!(description.non_constant_attributes.contains("humidity"));

        description.apply_update(&delta, UpdateMode::Replace);
        assert!(!description.non_constant_attributes.contains("humidity"));
        assert_eq!(description.non_constant_attributes.len(), 1);
        assert!(description.constant_attributes.contains("room"));
    }

    #[test]
    fn test_summary_projection() {
        let summary = kitchen_widget().basic();
        assert_eq!(summary.port, 5001);
        let decoded = ComponentSummary::from_data_object(&summary.to_data_object()).unwrap();
        assert_eq!(decoded, summary);
    }
}
