use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::schema::{ParamType, ToolSchema};
use super::ValueMap;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractViolation {
    TypeMismatch { param: String, expected_type: String, actual_type: String },
    MissingRequired { param: String },
    InvalidEnumValue { param: String, value: String, allowed: BTreeSet<String> },
}

impl ContractViolation {
    pub fn param(&self) -> &str {
        match self {
            Self::TypeMismatch { param, .. }
            | Self::MissingRequired { param }
            | Self::InvalidEnumValue { param, .. } => param,
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { param, expected_type, actual_type } => {
                write!(f, "`{param}` should be {expected_type} but was {actual_type}")
            }
            Self::MissingRequired { param } => write!(f, "`{param}` is required"),
            Self::InvalidEnumValue { param, value, allowed } => {
                let allowed = allowed.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
                write!(f, "`{param}` must be one of [{allowed}] but was `{value}`")
            }
        }
    }
}

/// Every violation found for one candidate, in schema parameter order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub tool: String,
    pub violations: Vec<ContractViolation>,
}

impl ContractReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Splits violations into those on required and optional parameters.
    pub fn partition<'a>(
        &'a self,
        schema: &ToolSchema,
    ) -> (Vec<&'a ContractViolation>, Vec<&'a ContractViolation>) {
        self.violations.iter().partition(|violation| {
            schema.parameter(violation.param()).map(|spec| spec.required).unwrap_or(true)
        })
    }

    pub fn summary(&self) -> String {
        if self.is_clean() {
            return format!("arguments for `{}` satisfy the tool contract", self.tool);
        }
        let details = self.violations.iter().map(ToString::to_string).collect::<Vec<_>>();
        format!("arguments for `{}` are invalid: {}", self.tool, details.join("; "))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ContractTester;

impl ContractTester {
    pub fn new() -> Self {
        Self
    }

    /// Reports every required/type/enum violation of `candidate` against
    /// `schema`. Pure: no coercion, no mutation, no logging.
    pub fn check(&self, schema: &ToolSchema, candidate: &ValueMap) -> ContractReport {
        let mut violations = Vec::new();

        for spec in &schema.parameters {
            let value = candidate.get(&spec.canonical_name).filter(|value| !value.is_null());
            let Some(value) = value else {
                if spec.required {
                    violations
                        .push(ContractViolation::MissingRequired { param: spec.canonical_name.clone() });
                }
                continue;
            };

            match &spec.declared_type {
                ParamType::Enum => {
                    let member = value.as_str().is_some_and(|text| spec.enum_values.contains(text));
                    if !member {
                        violations.push(ContractViolation::InvalidEnumValue {
                            param: spec.canonical_name.clone(),
                            value: display_value(value),
                            allowed: spec.enum_values.clone(),
                        });
                    }
                }
                ParamType::Unrecognized(_) => {}
                expected => {
                    if !kind_matches(expected, value) {
                        violations.push(ContractViolation::TypeMismatch {
                            param: spec.canonical_name.clone(),
                            expected_type: expected.to_string(),
                            actual_type: value_kind(value).to_string(),
                        });
                    }
                }
            }
        }

        ContractReport { tool: schema.name.clone(), violations }
    }
}

fn kind_matches(expected: &ParamType, value: &Value) -> bool {
    match expected {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Object => value.is_object(),
        ParamType::Array => value.is_array(),
        ParamType::Enum | ParamType::Unrecognized(_) => true,
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
