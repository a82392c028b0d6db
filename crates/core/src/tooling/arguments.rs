use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;

use super::schema::{ParamType, ParameterSpec, ToolSchema};
use super::ValueMap;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("tool `{tool}` requires `{parameter}` but neither the request nor its context provides it")]
    UnresolvableParameter { tool: String, parameter: String },
}

/// Concrete, coerced input for one tool invocation, keyed by canonical name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ArgumentSet(ValueMap);

impl ArgumentSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &ValueMap {
        &self.0
    }

    /// Returns a copy without `names`; used to drop invalid optional values.
    pub fn without<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut map = self.0.clone();
        for name in names {
            map.remove(name);
        }
        Self(map)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    ContextExact,
    DataExact,
    DataAlias,
    ContextAlias,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub parameter: String,
    pub source: ValueSource,
    pub key: String,
    pub coerced: bool,
}

/// Outcome of best-effort resolution; may still be missing required values.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ArgumentDraft {
    pub arguments: ArgumentSet,
    pub unresolved_required: Vec<String>,
    pub resolutions: Vec<Resolution>,
}

impl ArgumentDraft {
    pub fn is_complete(&self) -> bool {
        self.unresolved_required.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ArgumentBuilder;

impl ArgumentBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Builds a call-ready argument set, failing on the first required
    /// parameter that neither `data` nor `context` can supply.
    ///
    /// The result is not guaranteed contract-clean; run `ContractTester::check`
    /// before invoking.
    pub fn build(
        &self,
        schema: &ToolSchema,
        data: &ValueMap,
        context: &ValueMap,
    ) -> Result<ArgumentSet, ArgumentError> {
        let draft = self.resolve(schema, data, context);
        if let Some(parameter) = draft.unresolved_required.into_iter().next() {
            return Err(ArgumentError::UnresolvableParameter { tool: schema.name.clone(), parameter });
        }
        Ok(draft.arguments)
    }

    /// Resolves and coerces every parameter it can. Never fails.
    pub fn resolve(&self, schema: &ToolSchema, data: &ValueMap, context: &ValueMap) -> ArgumentDraft {
        let mut draft = ArgumentDraft::default();

        for spec in &schema.parameters {
            let Some((source, key, raw)) = locate(spec, data, context) else {
                if spec.required {
                    draft.unresolved_required.push(spec.canonical_name.clone());
                }
                continue;
            };

            let value = coerce(&spec.declared_type, raw);
            draft.resolutions.push(Resolution {
                parameter: spec.canonical_name.clone(),
                source,
                key: key.to_string(),
                coerced: value != *raw,
            });
            draft.arguments.0.insert(spec.canonical_name.clone(), value);
        }

        draft
    }
}

fn present<'a>(map: &'a ValueMap, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|value| !value.is_null())
}

// context exact > data exact > data alias > context alias
fn locate<'a>(
    spec: &'a ParameterSpec,
    data: &'a ValueMap,
    context: &'a ValueMap,
) -> Option<(ValueSource, &'a str, &'a Value)> {
    let name = spec.canonical_name.as_str();
    if let Some(value) = present(context, name) {
        return Some((ValueSource::ContextExact, name, value));
    }
    if let Some(value) = present(data, name) {
        return Some((ValueSource::DataExact, name, value));
    }
    for alias in &spec.aliases {
        if let Some(value) = present(data, alias) {
            return Some((ValueSource::DataAlias, alias, value));
        }
    }
    for alias in &spec.aliases {
        if let Some(value) = present(context, alias) {
            return Some((ValueSource::ContextAlias, alias, value));
        }
    }
    None
}

/// Best-effort conversion toward `target`. Values that cannot be converted
/// are passed through untouched so the contract check can report them.
pub fn coerce(target: &ParamType, raw: &Value) -> Value {
    let converted = match (target, raw) {
        (ParamType::Integer, Value::Number(number)) => integral(number),
        (ParamType::Integer, Value::String(text)) => {
            text.trim().parse::<i64>().ok().map(Value::from)
        }
        (ParamType::Number, Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (ParamType::Boolean, Value::String(text)) => {
            match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            }
        }
        (ParamType::String, Value::Number(number)) => Some(Value::String(number.to_string())),
        (ParamType::String | ParamType::Enum, Value::Bool(flag)) => {
            Some(Value::String(flag.to_string()))
        }
        (ParamType::Enum, Value::Number(number)) => Some(Value::String(number.to_string())),
        (ParamType::Object, Value::String(text)) => {
            serde_json::from_str::<Value>(text).ok().filter(Value::is_object)
        }
        (ParamType::Array, Value::String(text)) => {
            serde_json::from_str::<Value>(text).ok().filter(Value::is_array)
        }
        _ => None,
    };
    converted.unwrap_or_else(|| raw.clone())
}

fn integral(number: &Number) -> Option<Value> {
    if number.is_i64() || number.is_u64() {
        return None;
    }
    let float = number.as_f64()?;
    let in_range = float.fract() == 0.0 && float >= i64::MIN as f64 && float < i64::MAX as f64;
    in_range.then(|| Value::from(float as i64))
}
