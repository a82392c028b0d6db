use std::fs;
use std::path::Path;

use deskpilot_core::tooling::{SchemaIssue, SchemaValidator, ToolSchema};
use serde::Serialize;
use serde_json::Value;

use super::{to_data, CommandResult};

const COMMAND: &str = "schema";

#[derive(Debug, Serialize)]
struct SchemaSummary {
    tool: String,
    parameters: usize,
    required: Vec<String>,
    issues: Vec<SchemaIssue>,
}

#[derive(Debug, Serialize)]
struct SchemaLintReport {
    tools: Vec<SchemaSummary>,
    rejected: Vec<String>,
}

/// Lints a discovery listing. Structural issues are advisory and do not
/// change the exit code; only an unreadable or non-JSON file fails.
pub fn run(path: &Path) -> CommandResult {
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

    let listing = match serde_json::from_str::<Value>(&raw) {
        Ok(listing) => listing,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "invalid_json",
                format!("`{}` is not valid JSON: {error}", path.display()),
                3,
            );
        }
    };

    let (schemas, errors) = ToolSchema::from_discovery_listing(&listing);
    let validator = SchemaValidator::new();
    let tools = schemas
        .iter()
        .map(|schema| SchemaSummary {
            tool: schema.name.clone(),
            parameters: schema.parameters.len(),
            required: schema
                .required_parameters()
                .map(|spec| spec.canonical_name.clone())
                .collect(),
            issues: validator.validate_structure(schema).issues,
        })
        .collect::<Vec<_>>();
    let report = SchemaLintReport {
        tools,
        rejected: errors.iter().map(ToString::to_string).collect(),
    };

    let issue_count = report.tools.iter().map(|tool| tool.issues.len()).sum::<usize>();
    let message = format!(
        "{} tools parsed, {} rejected, {issue_count} structural issues",
        report.tools.len(),
        report.rejected.len()
    );

    CommandResult::success_with_data(COMMAND, message, to_data(&report))
}
