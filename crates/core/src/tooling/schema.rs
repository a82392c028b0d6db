use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Declared kind of a tool parameter.
///
/// Discovery payloads are third-party authored, so a token we do not know is
/// kept as `Unrecognized` instead of being rejected; the validator reports it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Enum,
    Unrecognized(String),
}

impl ParamType {
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Self::String,
            "integer" | "int" | "long" => Self::Integer,
            "number" | "float" | "double" | "decimal" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "object" | "dict" | "map" => Self::Object,
            "array" | "list" => Self::Array,
            "enum" => Self::Enum,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Types whose values an enum list can constrain.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Number | Self::Boolean | Self::Enum)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Enum => "enum",
            Self::Unrecognized(token) => token,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub canonical_name: String,
    pub declared_type: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub enum_values: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aliases: BTreeSet<String>,
}

impl ParameterSpec {
    pub fn new(canonical_name: impl Into<String>, declared_type: ParamType, required: bool) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            declared_type,
            required,
            enum_values: BTreeSet::new(),
            aliases: BTreeSet::new(),
        }
    }

    pub fn required(canonical_name: impl Into<String>, declared_type: ParamType) -> Self {
        Self::new(canonical_name, declared_type, true)
    }

    pub fn optional(canonical_name: impl Into<String>, declared_type: ParamType) -> Self {
        Self::new(canonical_name, declared_type, false)
    }

    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }
}

/// A remote tool's name plus its parameter list, as handed over by tool discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ParameterSpec>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("tool descriptor must be a JSON object")]
    NotAnObject,
    #[error("tool descriptor is missing a string `name` field")]
    MissingName,
    #[error("tool `{tool}` has a malformed parameter entry at position {index}")]
    MalformedParameter { tool: String, index: usize },
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterSpec>) -> Self {
        Self { name: name.into(), description: None, parameters }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parameter(&self, canonical_name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|spec| spec.canonical_name == canonical_name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|spec| spec.required)
    }

    /// Parses a discovery descriptor.
    ///
    /// Two shapes are understood: a flat `parameters` list of entries, and a
    /// JSON-Schema object under `inputSchema`, `input_schema` or `parameters`
    /// with `properties` and `required`. Extra fields are ignored.
    pub fn from_discovery(descriptor: &Value) -> Result<Self, DiscoveryError> {
        let object = descriptor.as_object().ok_or(DiscoveryError::NotAnObject)?;
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(DiscoveryError::MissingName)?;
        let description = object.get("description").and_then(Value::as_str).map(str::to_string);

        let parameters = match object.get("parameters") {
            Some(Value::Array(entries)) => parse_parameter_list(&name, entries)?,
            Some(Value::Object(schema)) => parse_json_schema(schema),
            _ => match object.get("inputSchema").or_else(|| object.get("input_schema")) {
                Some(Value::Object(schema)) => parse_json_schema(schema),
                _ => Vec::new(),
            },
        };

        Ok(Self { name, description, parameters })
    }

    /// Parses a discovery listing: either an array of descriptors or an object
    /// wrapping one under `tools`. Returns the schemas that parsed and the
    /// errors for those that did not.
    pub fn from_discovery_listing(listing: &Value) -> (Vec<Self>, Vec<DiscoveryError>) {
        let entries = match listing {
            Value::Array(entries) => entries.as_slice(),
            Value::Object(object) => match object.get("tools") {
                Some(Value::Array(entries)) => entries.as_slice(),
                _ => std::slice::from_ref(listing),
            },
            _ => return (Vec::new(), vec![DiscoveryError::NotAnObject]),
        };

        let mut schemas = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for entry in entries {
            match Self::from_discovery(entry) {
                Ok(schema) => schemas.push(schema),
                Err(error) => errors.push(error),
            }
        }
        (schemas, errors)
    }
}

fn parse_parameter_list(tool: &str, entries: &[Value]) -> Result<Vec<ParameterSpec>, DiscoveryError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let object = entry.as_object().ok_or_else(|| DiscoveryError::MalformedParameter {
                tool: tool.to_string(),
                index,
            })?;
            let name = object
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let required = object.get("required").and_then(Value::as_bool).unwrap_or(false);
            Ok(parse_property(name, object, required))
        })
        .collect()
}

fn parse_json_schema(schema: &Map<String, Value>) -> Vec<ParameterSpec> {
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect::<BTreeSet<_>>())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, property)| {
            let empty = Map::new();
            let property = property.as_object().unwrap_or(&empty);
            parse_property(name.clone(), property, required.contains(name.as_str()))
        })
        .collect()
}

fn parse_property(name: String, property: &Map<String, Value>, required: bool) -> ParameterSpec {
    let enum_values = property
        .get("enum")
        .or_else(|| property.get("enum_values"))
        .or_else(|| property.get("enumValues"))
        .and_then(Value::as_array)
        .map(|values| values.iter().map(scalar_label).collect::<BTreeSet<_>>())
        .unwrap_or_default();

    let declared_type = match property.get("type") {
        Some(Value::String(token)) => {
            let parsed = ParamType::from_token(token);
            if !enum_values.is_empty() && parsed.is_scalar() {
                ParamType::Enum
            } else {
                parsed
            }
        }
        Some(other) => ParamType::Unrecognized(other.to_string()),
        None if !enum_values.is_empty() => ParamType::Enum,
        None => ParamType::String,
    };

    let aliases = property
        .get("aliases")
        .or_else(|| property.get("x-aliases"))
        .and_then(Value::as_array)
        .map(|values| {
            values.iter().filter_map(Value::as_str).map(str::to_string).collect::<BTreeSet<_>>()
        })
        .unwrap_or_default();

    ParameterSpec { canonical_name: name, declared_type, required, enum_values, aliases }
}

fn scalar_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
