use std::fs;
use std::path::Path;

use deskpilot_core::config::parse_expected_format;
use deskpilot_core::tooling::ResponseParser;
use serde_json::Value;

use super::{to_data, CommandResult};

const COMMAND: &str = "parse";

/// Normalizes a captured tool response file. Content that is not JSON is
/// handed to the parser as a plain string.
pub fn run(path: &Path, format: Option<&str>) -> CommandResult {
    let expected = match format.map(parse_expected_format).transpose() {
        Ok(expected) => expected.flatten(),
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_argument", error.to_string(), 2);
        }
    };

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "io",
                format!("could not read `{}`: {error}", path.display()),
                2,
            );
        }
    };

    let response = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
    let result = ResponseParser::new().parse(&response, expected);

    let message = if result.success {
        match (&result.id, &result.link) {
            (Some(id), Some(link)) => format!("tool call succeeded: {id} ({link})"),
            (Some(id), None) => format!("tool call succeeded: {id}"),
            (None, Some(link)) => format!("tool call succeeded: {link}"),
            (None, None) => "tool call succeeded".to_string(),
        }
    } else {
        format!("tool call failed: {}", result.error.as_deref().unwrap_or("unknown error"))
    };

    CommandResult::success_with_data(COMMAND, message, to_data(&result))
}
