//! Configuration validation for themes
//!
//! Validates a theme's configuration document against a JSON-Schema-like
//! declaration and fills in declared defaults. The supported keywords are
//! `type`, `properties`, `required`, `additionalProperties`, `default`, `enum`
//! and `items`.
//!
//! Validation fails fast: the first failing field is reported with its path
//! (`colors.primary`, `fonts[2]`, or `$` for the document root).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ThemeError};

/// Primitive type names understood by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

/// `type` keyword: a single type or a list of accepted types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    One(JsonType),
    Many(Vec<JsonType>),
}

impl SchemaType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::One(kind) => kind.matches(value),
            Self::Many(kinds) => kinds.iter().any(|k| k.matches(value)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::One(kind) => kind.as_str().to_string(),
            Self::Many(kinds) => kinds
                .iter()
                .map(JsonType::as_str)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

/// `additionalProperties` keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<ConfigSchema>),
}

/// Declared shape of a theme configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ConfigSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ConfigSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigSchema {
    /// Parse a schema from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| ThemeError::validation("config_schema", format!("invalid schema: {}", e)))
    }
}

/// Validator for theme configuration documents
///
/// Stateless; every check is an associated function.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate `document` against `schema` and return it with defaults filled in
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Validation`] for the first failing field.
    pub fn validate(schema: &ConfigSchema, document: &Value) -> Result<Value> {
        Self::validate_node(schema, document.clone(), "")
    }

    /// Validate a theme configuration, with or without a declared schema
    ///
    /// Without a schema the document only has to be an object.
    pub fn validate_config(schema: Option<&ConfigSchema>, document: &Value) -> Result<Value> {
        match schema {
            Some(schema) => Self::validate(schema, document),
            None if document.is_object() => Ok(document.clone()),
            None => Err(ThemeError::validation("$", "configuration must be an object")),
        }
    }

    fn validate_node(schema: &ConfigSchema, value: Value, path: &str) -> Result<Value> {
        if let Some(kind) = &schema.kind {
            if !kind.matches(&value) {
                return Err(ThemeError::validation(
                    display_path(path),
                    format!("expected {}, found {}", kind.describe(), type_name(&value)),
                ));
            }
        }

        if let Some(allowed) = &schema.allowed {
            if !allowed.contains(&value) {
                let options = allowed
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ThemeError::validation(
                    display_path(path),
                    format!("value {} is not one of [{}]", value, options),
                ));
            }
        }

        match value {
            Value::Object(map) => Self::validate_object(schema, map, path).map(Value::Object),
            Value::Array(items) => match &schema.items {
                Some(item_schema) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Self::validate_node(item_schema, item, &format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                None => Ok(Value::Array(items)),
            },
            other => Ok(other),
        }
    }

    fn validate_object(
        schema: &ConfigSchema,
        mut map: Map<String, Value>,
        path: &str,
    ) -> Result<Map<String, Value>> {
        for (key, property) in &schema.properties {
            let child_path = join_path(path, key);
            let current = match map.remove(key) {
                Some(value) => Some(value),
                None => property.default.clone(),
            };
            if let Some(value) = current {
                let validated = Self::validate_node(property, value, &child_path)?;
                map.insert(key.clone(), validated);
            }
        }

        for key in &schema.required {
            if !map.contains_key(key) {
                return Err(ThemeError::validation(
                    join_path(path, key),
                    "missing required field",
                ));
            }
        }

        let extra: Vec<String> = map
            .keys()
            .filter(|k| !schema.properties.contains_key(*k))
            .cloned()
            .collect();

        match &schema.additional_properties {
            Some(AdditionalProperties::Allowed(false)) => {
                if let Some(key) = extra.first() {
                    return Err(ThemeError::validation(join_path(path, key), "unknown field"));
                }
            }
            Some(AdditionalProperties::Schema(extra_schema)) => {
                for key in extra {
                    if let Some(value) = map.remove(&key) {
                        let validated = Self::validate_node(extra_schema, value, &join_path(path, &key))?;
                        map.insert(key, validated);
                    }
                }
            }
            Some(AdditionalProperties::Allowed(true)) | None => {}
        }

        Ok(map)
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
