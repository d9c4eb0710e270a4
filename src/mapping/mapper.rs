//! # Data Mapper
//!
//! Moves field values between a vendor payload and the canonical task document
//! according to a [`FieldMappingConfig`].
//!
//! ## Direction
//!
//! - `Pull` reads each mapping's `external_field` from the source and writes its
//!   `canonical_field` in the target.
//! - `Push` reads `canonical_field` and writes `external_field`.
//!
//! Only mappings and transforms declared for that direction (or
//! `bidirectional`) take part. Validations always inspect the canonical side:
//! the target after a pull, the source before a push.
//!
//! ## Errors
//!
//! Mapping never stops at the first problem. Every missing required field,
//! failed transform and failed validation is collected into
//! [`MappingOutcome::errors`] next to a best-effort target document.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ErrorCode, ZenError, ZenResult};
use crate::mapping::path::{get_path, set_path};
use crate::mapping::{
    CustomTransformer, FieldMapping, FieldMappingConfig, FieldTransformer, FieldValidator,
    FormatTransformer, MapTransformer, PatternValidator, RangeValidator, RequiredValidator,
    TemplateTransformer, TypeValidator,
};
use crate::models::{SyncDirection, Task};

/// Problem found on one field while mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: ErrorCode,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingOutcome {
    pub target: Value,
    pub errors: Vec<FieldError>,
}

impl MappingOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors_for(&self, field: &str) -> impl Iterator<Item = &FieldError> {
        let field = field.to_string();
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// The target, or a `MappingError` summarising every field error
    pub fn into_result(self) -> ZenResult<Value> {
        if self.errors.is_empty() {
            return Ok(self.target);
        }
        let summary = self
            .errors
            .iter()
            .map(|e| format!("{} ({}): {}", e.field, e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ZenError::MappingError(summary))
    }

    /// Deserialize a pulled target into a canonical [`Task`]
    pub fn to_task(&self) -> ZenResult<Task> {
        Ok(serde_json::from_value(self.target.clone())?)
    }
}

#[derive(Debug)]
pub struct DataMapper {
    transformers: HashMap<String, Arc<dyn FieldTransformer>>,
    validators: HashMap<String, Arc<dyn FieldValidator>>,
    templates: Arc<RwLock<HashMap<String, String>>>,
}

impl DataMapper {
    /// Mapper with the built-in transformers and validators registered
    pub fn new() -> Self {
        let templates = Arc::new(RwLock::new(HashMap::new()));
        let mut mapper = Self {
            transformers: HashMap::new(),
            validators: HashMap::new(),
            templates: Arc::clone(&templates),
        };

        mapper.register_transformer(Arc::new(MapTransformer));
        mapper.register_transformer(Arc::new(FormatTransformer));
        mapper.register_transformer(Arc::new(TemplateTransformer::new(templates)));
        mapper.register_transformer(Arc::new(CustomTransformer));

        mapper.register_validator(Arc::new(RequiredValidator));
        mapper.register_validator(Arc::new(TypeValidator));
        mapper.register_validator(Arc::new(RangeValidator));
        mapper.register_validator(Arc::new(PatternValidator::default()));
        mapper
    }

    /// Register (or replace) a transformer under its own name
    pub fn register_transformer(&mut self, transformer: Arc<dyn FieldTransformer>) {
        self.transformers
            .insert(transformer.name().to_string(), transformer);
    }

    /// Register (or replace) a validator under its own name
    pub fn register_validator(&mut self, validator: Arc<dyn FieldValidator>) {
        self.validators.insert(validator.name().to_string(), validator);
    }

    /// Make `template` available to the `template` transformer as `name`
    pub fn register_template(&self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.write().insert(name.into(), template.into());
    }

    pub fn map_fields(
        &self,
        source: &Value,
        config: &FieldMappingConfig,
        direction: SyncDirection,
    ) -> MappingOutcome {
        let mut outcome = MappingOutcome {
            target: Value::Object(serde_json::Map::new()),
            errors: Vec::new(),
        };

        if direction == SyncDirection::Bidirectional {
            outcome.errors.push(FieldError::new(
                "",
                ErrorCode::InvalidRequest,
                "map_fields needs a concrete direction (pull or push)",
            ));
            return outcome;
        }

        for mapping in config
            .mappings
            .iter()
            .filter(|m| m.direction.applies_to(direction))
        {
            self.map_one(source, mapping, config, direction, &mut outcome);
        }

        let canonical = match direction {
            SyncDirection::Push => source,
            _ => &outcome.target,
        };
        let validation_errors = self.validate(canonical, config);
        outcome.errors.extend(validation_errors);

        debug!(
            direction = %direction,
            mappings = config.mappings.len(),
            errors = outcome.errors.len(),
            "Mapped fields"
        );
        outcome
    }

    fn map_one(
        &self,
        source: &Value,
        mapping: &FieldMapping,
        config: &FieldMappingConfig,
        direction: SyncDirection,
        outcome: &mut MappingOutcome,
    ) {
        let (from, to) = match direction {
            SyncDirection::Push => (&mapping.canonical_field, &mapping.external_field),
            _ => (&mapping.external_field, &mapping.canonical_field),
        };

        let mut value = match get_path(source, from).filter(|v| !v.is_null()) {
            Some(found) => found.clone(),
            None if mapping.required => {
                outcome.errors.push(FieldError::new(
                    &mapping.canonical_field,
                    ErrorCode::RequiredFieldMissing,
                    format!("required field '{from}' is missing"),
                ));
                return;
            }
            None => match &mapping.default_value {
                Some(default) => default.clone(),
                // Absent optional fields stay absent in the target
                None => return,
            },
        };

        for transform in config.transforms_for(&mapping.canonical_field, direction) {
            let Some(transformer) = self.transformers.get(&transform.transform_type) else {
                outcome.errors.push(FieldError::new(
                    &mapping.canonical_field,
                    ErrorCode::TransformFailed,
                    format!("unknown transformer '{}'", transform.transform_type),
                ));
                break;
            };

            match transformer.transform(&value, &transform.config) {
                Ok(next) => value = next,
                Err(e) => {
                    outcome.errors.push(FieldError::new(
                        &mapping.canonical_field,
                        ErrorCode::TransformFailed,
                        e.to_string(),
                    ));
                    break;
                }
            }
        }

        set_path(&mut outcome.target, to, value);
    }

    /// Run every configured validation against a canonical document
    pub fn validate(&self, canonical: &Value, config: &FieldMappingConfig) -> Vec<FieldError> {
        let mut errors = Vec::new();

        for validation in &config.validations {
            let value = get_path(canonical, &validation.field);
            for rule in &validation.rules {
                let result = match self.validators.get(&rule.rule_type) {
                    Some(validator) => validator.validate(value, &rule.config),
                    None => Err(ZenError::ValidationError(format!(
                        "unknown validator '{}'",
                        rule.rule_type
                    ))),
                };

                if let Err(e) = result {
                    let message = rule.message.clone().unwrap_or_else(|| e.to_string());
                    errors.push(FieldError::new(
                        &validation.field,
                        ErrorCode::ValidationFailed,
                        message,
                    ));
                }
            }
        }

        errors
    }
}

impl Default for DataMapper {
    fn default() -> Self {
        Self::new()
    }
}
