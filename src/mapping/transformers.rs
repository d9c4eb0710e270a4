//! Built-in field transformers.
//!
//! A transformer receives the value being mapped plus the `config` object of
//! its [`FieldTransform`](crate::mapping::FieldTransform) and returns the
//! replacement value. Failures surface as `TRANSFORM_FAILED` on the field.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ZenError, ZenResult};
use crate::mapping::path::{get_path, stringify};

pub trait FieldTransformer: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn transform(&self, value: &Value, config: &Value) -> ZenResult<Value>;
}

fn transform_error(transformer: &str, message: impl fmt::Display) -> ZenError {
    ZenError::MappingError(format!("{transformer} transform failed: {message}"))
}

/// Table lookup on the stringified value; unknown values pass through.
///
/// The table is `config.mapping`, or `config` itself when that key is absent.
#[derive(Debug, Default)]
pub struct MapTransformer;

impl FieldTransformer for MapTransformer {
    fn name(&self) -> &str {
        "map"
    }

    fn transform(&self, value: &Value, config: &Value) -> ZenResult<Value> {
        let table = config
            .get("mapping")
            .unwrap_or(config)
            .as_object()
            .ok_or_else(|| transform_error("map", "config must be an object of value mappings"))?;

        Ok(table
            .get(&stringify(value))
            .cloned()
            .unwrap_or_else(|| value.clone()))
    }
}

/// printf-style formatting with a single verb: `%s`, `%v`, `%d`, `%f`, `%.Nf`, `%x`.
///
/// `%%` is a literal percent sign.
#[derive(Debug, Default)]
pub struct FormatTransformer;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Verb {
    Str,
    Int,
    Float(Option<usize>),
    Hex,
}

impl FormatTransformer {
    fn render(format: &str, value: &Value) -> ZenResult<String> {
        let mut output = String::with_capacity(format.len() + 16);
        let mut chars = format.chars().peekable();
        let mut seen_verb = false;

        while let Some(c) = chars.next() {
            if c != '%' {
                output.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                output.push('%');
                continue;
            }

            let mut precision = None;
            if chars.peek() == Some(&'.') {
                chars.next();
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                precision = Some(
                    digits
                        .parse::<usize>()
                        .map_err(|_| transform_error("format", "precision requires digits"))?,
                );
            }

            let verb = match chars.next() {
                Some('s') | Some('v') if precision.is_none() => Verb::Str,
                Some('d') if precision.is_none() => Verb::Int,
                Some('x') if precision.is_none() => Verb::Hex,
                Some('f') => Verb::Float(precision),
                Some(other) => {
                    return Err(transform_error("format", format!("unsupported verb '%{other}'")))
                }
                None => return Err(transform_error("format", "dangling '%' at end of format")),
            };

            if seen_verb {
                return Err(transform_error("format", "format may contain only one verb"));
            }
            seen_verb = true;
            output.push_str(&Self::apply(verb, value)?);
        }

        Ok(output)
    }

    fn apply(verb: Verb, value: &Value) -> ZenResult<String> {
        match verb {
            Verb::Str => Ok(stringify(value)),
            Verb::Int => as_i64(value)
                .map(|n| n.to_string())
                .ok_or_else(|| transform_error("format", format!("%d needs an integer, got {value}"))),
            Verb::Float(precision) => {
                let n = as_f64(value).ok_or_else(|| {
                    transform_error("format", format!("%f needs a number, got {value}"))
                })?;
                Ok(format!("{:.prec$}", n, prec = precision.unwrap_or(6)))
            }
            Verb::Hex => match value {
                Value::String(s) => Ok(hex::encode(s.as_bytes())),
                other => as_i64(other)
                    .map(|n| format!("{n:x}"))
                    .ok_or_else(|| transform_error("format", format!("%x needs an integer or string, got {other}"))),
            },
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl FieldTransformer for FormatTransformer {
    fn name(&self) -> &str {
        "format"
    }

    fn transform(&self, value: &Value, config: &Value) -> ZenResult<Value> {
        let format = config
            .get("format")
            .and_then(Value::as_str)
            .ok_or_else(|| transform_error("format", "config.format must be a string"))?;
        Self::render(format, value).map(Value::String)
    }
}

/// Renders `{{placeholder}}` templates.
///
/// `{{value}}` is the whole value; any other placeholder is a dotted path into
/// an object value and renders empty when absent. The template comes from
/// `config.template` or, by name, from `config.name` among registered templates.
#[derive(Debug, Default)]
pub struct TemplateTransformer {
    templates: Arc<RwLock<HashMap<String, String>>>,
}

impl TemplateTransformer {
    pub fn new(templates: Arc<RwLock<HashMap<String, String>>>) -> Self {
        Self { templates }
    }

    pub fn render(template: &str, value: &Value) -> String {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            output.push_str(&rest[..start]);

            let key = rest[start + 2..start + 2 + len].trim();
            if key == "value" {
                output.push_str(&stringify(value));
            } else if let Some(found) = get_path(value, key) {
                output.push_str(&stringify(found));
            }
            rest = &rest[start + 2 + len + 2..];
        }

        output.push_str(rest);
        output
    }
}

impl FieldTransformer for TemplateTransformer {
    fn name(&self) -> &str {
        "template"
    }

    fn transform(&self, value: &Value, config: &Value) -> ZenResult<Value> {
        if let Some(inline) = config.get("template").and_then(Value::as_str) {
            return Ok(Value::String(Self::render(inline, value)));
        }

        let name = config
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| transform_error("template", "config needs 'template' or 'name'"))?;
        let templates = self.templates.read();
        let template = templates
            .get(name)
            .ok_or_else(|| transform_error("template", format!("unknown template '{name}'")))?;
        Ok(Value::String(Self::render(template, value)))
    }
}

/// Identity; stands in until a plugin registers its own hook under `custom`
#[derive(Debug, Default)]
pub struct CustomTransformer;

impl FieldTransformer for CustomTransformer {
    fn name(&self) -> &str {
        "custom"
    }

    fn transform(&self, value: &Value, _config: &Value) -> ZenResult<Value> {
        Ok(value.clone())
    }
}
