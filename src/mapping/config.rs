//! Declarative mapping tables between a vendor payload and the canonical task.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::SyncDirection;

/// One canonical field paired with its location in the vendor payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Dotted path in the canonical document
    pub canonical_field: String,
    /// Dotted path in the vendor document
    pub external_field: String,
    #[serde(default = "bidirectional")]
    pub direction: SyncDirection,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

fn bidirectional() -> SyncDirection {
    SyncDirection::Bidirectional
}

impl FieldMapping {
    pub fn new(canonical_field: impl Into<String>, external_field: impl Into<String>) -> Self {
        Self {
            canonical_field: canonical_field.into(),
            external_field: external_field.into(),
            direction: SyncDirection::Bidirectional,
            required: false,
            default_value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_direction(mut self, direction: SyncDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// Transformer applied to a canonical field's value while it is being mapped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTransform {
    /// Canonical field this transform is attached to
    pub field: String,
    /// Registered transformer name (`map`, `format`, `template`, `custom`, ...)
    #[serde(rename = "type")]
    pub transform_type: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default = "bidirectional")]
    pub direction: SyncDirection,
}

impl FieldTransform {
    pub fn new(field: impl Into<String>, transform_type: impl Into<String>, config: Value) -> Self {
        Self {
            field: field.into(),
            transform_type: transform_type.into(),
            config,
            direction: SyncDirection::Bidirectional,
        }
    }

    pub fn with_direction(mut self, direction: SyncDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// A single validator invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Registered validator name (`required`, `type`, `range`, `pattern`, ...)
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub config: Value,
    /// Replaces the validator's own message on failure
    #[serde(default)]
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn new(rule_type: impl Into<String>, config: Value) -> Self {
        Self {
            rule_type: rule_type.into(),
            config,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    /// Canonical field the rules inspect
    pub field: String,
    pub rules: Vec<ValidationRule>,
}

impl FieldValidation {
    pub fn new(field: impl Into<String>, rules: Vec<ValidationRule>) -> Self {
        Self {
            field: field.into(),
            rules,
        }
    }
}

/// Ordered mappings, transforms and validations for one plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingConfig {
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub transforms: Vec<FieldTransform>,
    #[serde(default)]
    pub validations: Vec<FieldValidation>,
}

impl FieldMappingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_transform(mut self, transform: FieldTransform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn with_validation(mut self, validation: FieldValidation) -> Self {
        self.validations.push(validation);
        self
    }

    /// Transforms attached to `field` that run when mapping `direction`
    pub(crate) fn transforms_for<'a>(
        &'a self,
        field: &'a str,
        direction: SyncDirection,
    ) -> impl Iterator<Item = &'a FieldTransform> + 'a {
        self.transforms
            .iter()
            .filter(move |t| t.field == field && t.direction.applies_to(direction))
    }
}
