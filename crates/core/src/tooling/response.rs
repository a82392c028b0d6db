use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized outcome of one remote tool call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolInvocationResult {
    pub success: bool,
    pub id: Option<String>,
    pub link: Option<String>,
    pub error: Option<String>,
    pub raw: Value,
}

impl ToolInvocationResult {
    pub fn failure(error: impl Into<String>, raw: Value) -> Self {
        Self { success: false, id: None, link: None, error: Some(error.into()), raw }
    }
}

/// Known response shapes, in auto-detection priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// `{"content": [{"type": "text", "text": ...}, ...], "isError": false}`
    ContentEnvelope,
    /// `{"status": "ok", "id": ..., "url": ..., "error": ...}`
    StatusObject,
    Generic,
}

impl ResponseFormat {
    pub const DETECTION_ORDER: [Self; 3] = [Self::ContentEnvelope, Self::StatusObject, Self::Generic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentEnvelope => "content_envelope",
            Self::StatusObject => "status_object",
            Self::Generic => "generic",
        }
    }

    fn has_markers(&self, object: &Map<String, Value>) -> bool {
        match self {
            Self::ContentEnvelope => object.get("content").is_some_and(Value::is_array),
            Self::StatusObject => object
                .get("status")
                .is_some_and(|status| status.is_string() || status.is_boolean() || status.is_number()),
            Self::Generic => true,
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "content_envelope" | "content" | "a" => Ok(Self::ContentEnvelope),
            "status_object" | "status" | "b" => Ok(Self::StatusObject),
            "generic" => Ok(Self::Generic),
            other => Err(format!(
                "unsupported response format `{other}` (expected content_envelope|status_object|generic)"
            )),
        }
    }
}

const ID_KEYS: [&str; 6] = ["id", "key", "issue_key", "issueKey", "page_id", "pageId"];
const LINK_KEYS: [&str; 5] = ["url", "link", "href", "html_url", "webUrl"];
const ERROR_KEYS: [&str; 4] = ["error", "errors", "error_message", "errorMessage"];
const SUCCESS_STATUSES: [&str; 8] =
    ["ok", "success", "succeeded", "successful", "created", "done", "completed", "accepted"];

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Normalizes `raw`. Never fails: payloads that cannot be interpreted
    /// become `success = false` with a description in `error`.
    pub fn parse(&self, raw: &Value, expected: Option<ResponseFormat>) -> ToolInvocationResult {
        let Some(object) = raw.as_object() else {
            return match raw {
                Value::Null => ToolInvocationResult::failure("tool returned an empty response", Value::Null),
                other => ToolInvocationResult::failure(
                    format!("tool returned a bare {} instead of an object", kind_name(other)),
                    other.clone(),
                ),
            };
        };

        let format = match expected {
            Some(format) if format.has_markers(object) => format,
            Some(format) => {
                return ToolInvocationResult::failure(
                    format!("response does not match the expected `{format}` format"),
                    raw.clone(),
                );
            }
            None => self.detect(raw).unwrap_or(ResponseFormat::Generic),
        };

        match format {
            ResponseFormat::ContentEnvelope => parse_content_envelope(object, raw),
            ResponseFormat::StatusObject => parse_status_object(object, raw),
            ResponseFormat::Generic => parse_generic(object, raw),
        }
    }

    pub fn detect(&self, raw: &Value) -> Option<ResponseFormat> {
        let object = raw.as_object()?;
        ResponseFormat::DETECTION_ORDER.into_iter().find(|format| format.has_markers(object))
    }
}

fn parse_content_envelope(object: &Map<String, Value>, raw: &Value) -> ToolInvocationResult {
    let is_error = object
        .get("isError")
        .or_else(|| object.get("is_error"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let entries = object.get("content").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);

    let mut id = None;
    let mut link = None;
    let mut texts = Vec::new();
    let mut embedded_error = None;

    for entry in entries {
        let Some(entry) = entry.as_object() else { continue };
        match entry.get("type").and_then(Value::as_str) {
            Some("text") => {
                let Some(text) = entry.get("text").and_then(Value::as_str) else { continue };
                texts.push(text.trim().to_string());
                match serde_json::from_str::<Value>(text) {
                    Ok(Value::Object(inner)) => {
                        id = id.or_else(|| first_string(&inner, &ID_KEYS));
                        link = link.or_else(|| first_string(&inner, &LINK_KEYS));
                        embedded_error = embedded_error.or_else(|| error_text(&inner));
                    }
                    _ => link = link.or_else(|| find_url(text)),
                }
            }
            Some("resource") | Some("resource_link") => {
                let uri = entry
                    .get("resource")
                    .and_then(Value::as_object)
                    .and_then(|resource| resource.get("uri"))
                    .or_else(|| entry.get("uri"))
                    .and_then(Value::as_str);
                link = link.or_else(|| uri.map(str::to_string));
            }
            _ => {}
        }
    }

    if is_error || embedded_error.is_some() {
        let error = embedded_error
            .or_else(|| {
                let joined = texts.join("\n");
                (!joined.is_empty()).then_some(joined)
            })
            .unwrap_or_else(|| "tool reported an error without details".to_string());
        return ToolInvocationResult { success: false, id, link, error: Some(error), raw: raw.clone() };
    }

    ToolInvocationResult { success: true, id, link, error: None, raw: raw.clone() }
}

fn parse_status_object(object: &Map<String, Value>, raw: &Value) -> ToolInvocationResult {
    let status = object.get("status").unwrap_or(&Value::Null);
    let status_ok = match status {
        Value::Bool(flag) => *flag,
        Value::Number(code) => code.as_u64().is_some_and(|code| (200..300).contains(&code)),
        Value::String(text) => SUCCESS_STATUSES.contains(&text.trim().to_ascii_lowercase().as_str()),
        _ => false,
    };
    let error = error_text(object);
    let id = first_string(object, &ID_KEYS);
    let link = first_string(object, &LINK_KEYS);

    if status_ok && error.is_none() {
        return ToolInvocationResult { success: true, id, link, error: None, raw: raw.clone() };
    }

    let error = error
        .or_else(|| first_string(object, &["message", "detail"]))
        .unwrap_or_else(|| format!("tool reported status {}", status_label(status)));
    ToolInvocationResult { success: false, id, link, error: Some(error), raw: raw.clone() }
}

fn parse_generic(object: &Map<String, Value>, raw: &Value) -> ToolInvocationResult {
    let flagged_failure = ["success", "ok"]
        .iter()
        .any(|key| matches!(object.get(*key), Some(Value::Bool(false))));
    if flagged_failure {
        let error = error_text(object)
            .or_else(|| first_string(object, &["message", "detail"]))
            .unwrap_or_else(|| "tool reported success=false".to_string());
        return ToolInvocationResult::failure(error, raw.clone());
    }

    match error_text(object) {
        Some(error) => ToolInvocationResult::failure(error, raw.clone()),
        None => ToolInvocationResult { success: true, id: None, link: None, error: None, raw: raw.clone() },
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn error_text(object: &Map<String, Value>) -> Option<String> {
    ERROR_KEYS.iter().find_map(|key| describe_error(object.get(*key)?))
}

fn describe_error(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.trim().to_string()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => {
            let parts = items.iter().filter_map(describe_error).collect::<Vec<_>>();
            Some(if parts.is_empty() { Value::Array(items.clone()).to_string() } else { parts.join("; ") })
        }
        Value::Object(inner) => Some(
            first_string(inner, &["message", "detail", "description"])
                .unwrap_or_else(|| value.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

fn find_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| token.starts_with("http://") || token.starts_with("https://"))
        .map(|token| token.trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | ']' | '"')).to_string())
}

fn status_label(status: &Value) -> String {
    match status {
        Value::String(text) => format!("`{text}`"),
        Value::Null => "<missing>".to_string(),
        other => other.to_string(),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
