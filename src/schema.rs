//! Entity schema supplied by the application.
//!
//! A `Model` is a set of entity descriptions. Each entity declares an ordered
//! list of attributes; inserts and updates always walk this declared list.

use crate::error::{Result, StoreError};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage type of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    String,
    Integer,
    Double,
    Boolean,
    /// Any JSON value.
    Json,
}

impl AttributeType {
    /// Whether a non-null value is acceptable for this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Integer => value.is_i64() || value.is_u64(),
            AttributeType::Double => value.is_number(),
            AttributeType::Boolean => value.is_boolean(),
            AttributeType::Json => true,
        }
    }
}

/// A declared attribute.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub name: String,
    pub attribute_type: AttributeType,
    /// Whether null is allowed at save time.
    pub optional: bool,
}

/// A declared entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityDescription {
    pub name: String,
    attributes: Vec<AttributeDescription>,
}

impl EntityDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Declare an optional attribute.
    pub fn attribute(mut self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.attributes.push(AttributeDescription {
            name: name.into(),
            attribute_type,
            optional: true,
        });
        self
    }

    /// Declare an attribute that must be non-null when saved.
    pub fn required(mut self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.attributes.push(AttributeDescription {
            name: name.into(),
            attribute_type,
            optional: false,
        });
        self
    }

    /// Declared attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeDescription] {
        &self.attributes
    }

    /// Declared attribute names in declaration order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn attribute_named(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check a single value against the declaration of `attribute`.
    pub fn validate_value(&self, attribute: &AttributeDescription, value: &Value) -> Result<()> {
        if value.is_null() {
            if attribute.optional {
                return Ok(());
            }
            return Err(StoreError::Validation {
                entity: self.name.clone(),
                attribute: attribute.name.clone(),
                reason: "required attribute is null".into(),
            });
        }

        if !attribute.attribute_type.accepts(value) {
            return Err(StoreError::Validation {
                entity: self.name.clone(),
                attribute: attribute.name.clone(),
                reason: format!("expected {:?}, got {}", attribute.attribute_type, value),
            });
        }

        Ok(())
    }
}

/// The full schema of a container.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Model {
    entities: HashMap<String, EntityDescription>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. A later entity with the same name replaces the earlier one.
    pub fn with_entity(mut self, entity: EntityDescription) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.get(name)
    }

    /// Look up an entity, failing with `UnknownEntity`.
    pub fn require_entity(&self, name: &str) -> Result<&EntityDescription> {
        self.entity(name)
            .ok_or_else(|| StoreError::UnknownEntity(name.to_string()))
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}
