//! Built-in field validators.
//!
//! Validators inspect a field of the canonical document after mapping. The
//! value is `None` when the field is absent; every validator except
//! `required` accepts an absent or null value.

use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{ZenError, ZenResult};

pub trait FieldValidator: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn validate(&self, value: Option<&Value>, config: &Value) -> ZenResult<()>;
}

fn invalid(message: impl Into<String>) -> ZenError {
    ZenError::ValidationError(message.into())
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

#[derive(Debug, Default)]
pub struct RequiredValidator;

impl FieldValidator for RequiredValidator {
    fn name(&self) -> &str {
        "required"
    }

    fn validate(&self, value: Option<&Value>, _config: &Value) -> ZenResult<()> {
        match present(value) {
            None => Err(invalid("value is required")),
            Some(Value::String(s)) if s.trim().is_empty() => Err(invalid("value must not be blank")),
            Some(Value::Array(items)) if items.is_empty() => Err(invalid("value must not be empty")),
            Some(_) => Ok(()),
        }
    }
}

/// `config.type` ∈ {string, number, integer, boolean, array, object}
#[derive(Debug, Default)]
pub struct TypeValidator;

impl FieldValidator for TypeValidator {
    fn name(&self) -> &str {
        "type"
    }

    fn validate(&self, value: Option<&Value>, config: &Value) -> ZenResult<()> {
        let Some(value) = present(value) else {
            return Ok(());
        };
        let expected = config
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("type rule needs config.type"))?;

        let matches = match expected {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            other => return Err(invalid(format!("unknown type '{other}' in type rule"))),
        };

        if matches {
            Ok(())
        } else {
            Err(invalid(format!("expected {expected}, got {value}")))
        }
    }
}

/// Inclusive `config.min` / `config.max` on numbers, or on character count for strings
#[derive(Debug, Default)]
pub struct RangeValidator;

impl FieldValidator for RangeValidator {
    fn name(&self) -> &str {
        "range"
    }

    fn validate(&self, value: Option<&Value>, config: &Value) -> ZenResult<()> {
        let Some(value) = present(value) else {
            return Ok(());
        };
        let (measured, what) = match value {
            Value::Number(n) => (n.as_f64().unwrap_or(f64::NAN), "value"),
            Value::String(s) => (s.chars().count() as f64, "length"),
            other => return Err(invalid(format!("range rule applies to numbers and strings, got {other}"))),
        };

        if let Some(min) = config.get("min").and_then(Value::as_f64) {
            if measured < min {
                return Err(invalid(format!("{what} {measured} is below minimum {min}")));
            }
        }
        if let Some(max) = config.get("max").and_then(Value::as_f64) {
            if measured > max {
                return Err(invalid(format!("{what} {measured} exceeds maximum {max}")));
            }
        }
        Ok(())
    }
}

/// String values must match `config.pattern`; compiled patterns are cached
#[derive(Debug, Default)]
pub struct PatternValidator {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl PatternValidator {
    fn regex(&self, pattern: &str) -> ZenResult<Regex> {
        if let Some(regex) = self.compiled.read().get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)
            .map_err(|e| invalid(format!("invalid pattern '{pattern}': {e}")))?;
        self.compiled
            .write()
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl FieldValidator for PatternValidator {
    fn name(&self) -> &str {
        "pattern"
    }

    fn validate(&self, value: Option<&Value>, config: &Value) -> ZenResult<()> {
        let Some(value) = present(value) else {
            return Ok(());
        };
        let pattern = config
            .get("pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("pattern rule needs config.pattern"))?;
        let text = value
            .as_str()
            .ok_or_else(|| invalid(format!("pattern rule applies to strings, got {value}")))?;

        if self.regex(pattern)?.is_match(text) {
            Ok(())
        } else {
            Err(invalid(format!("'{text}' does not match pattern '{pattern}'")))
        }
    }
}
