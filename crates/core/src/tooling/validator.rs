use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::schema::{ParamType, ToolSchema};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaIssueKind {
    EmptyToolName,
    EmptyParameterName,
    UnrecognizedType,
    EmptyEnumValues,
    EnumOnNonEnumType,
    DuplicateParameter,
    AliasCollision,
}

/// Advisory finding about a discovered schema. Never blocks registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub kind: SchemaIssueKind,
    pub parameter: Option<String>,
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchemaValidation {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaValidation {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, kind: SchemaIssueKind, parameter: Option<&str>, message: String) {
        self.issues.push(SchemaIssue { kind, parameter: parameter.map(str::to_string), message });
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_structure(&self, schema: &ToolSchema) -> SchemaValidation {
        let mut validation = SchemaValidation::default();
        let tool = schema.name.trim();

        if tool.is_empty() {
            validation.push(
                SchemaIssueKind::EmptyToolName,
                None,
                "tool schema has an empty name".to_string(),
            );
        }

        // name -> canonical parameter that claimed it first
        let mut claimed: HashMap<&str, &str> = HashMap::new();

        for (index, spec) in schema.parameters.iter().enumerate() {
            let name = spec.canonical_name.trim();
            if name.is_empty() {
                validation.push(
                    SchemaIssueKind::EmptyParameterName,
                    None,
                    format!("tool `{tool}` parameter #{index} has an empty name"),
                );
                continue;
            }

            if let ParamType::Unrecognized(token) = &spec.declared_type {
                validation.push(
                    SchemaIssueKind::UnrecognizedType,
                    Some(name),
                    format!("tool `{tool}` parameter `{name}` declares unrecognized type `{token}`"),
                );
            }

            if spec.declared_type == ParamType::Enum && spec.enum_values.is_empty() {
                validation.push(
                    SchemaIssueKind::EmptyEnumValues,
                    Some(name),
                    format!("tool `{tool}` enum parameter `{name}` lists no allowed values"),
                );
            }

            if spec.declared_type != ParamType::Enum && !spec.enum_values.is_empty() {
                validation.push(
                    SchemaIssueKind::EnumOnNonEnumType,
                    Some(name),
                    format!(
                        "tool `{tool}` parameter `{name}` lists allowed values but is typed `{}`; they are not enforced",
                        spec.declared_type
                    ),
                );
            }

            if claimed.insert(name, name).is_some() {
                validation.push(
                    SchemaIssueKind::DuplicateParameter,
                    Some(name),
                    format!("tool `{tool}` declares parameter `{name}` more than once"),
                );
            }
        }

        for spec in &schema.parameters {
            let owner = spec.canonical_name.trim();
            if owner.is_empty() {
                continue;
            }
            for alias in &spec.aliases {
                let alias = alias.trim();
                if alias == owner {
                    continue;
                }
                match claimed.get(alias) {
                    Some(other) if *other != owner => validation.push(
                        SchemaIssueKind::AliasCollision,
                        Some(owner),
                        format!(
                            "tool `{tool}` alias `{alias}` of `{owner}` is already claimed by `{other}`"
                        ),
                    ),
                    Some(_) => {}
                    None => {
                        claimed.insert(alias, owner);
                    }
                }
            }
        }

        validation
    }
}

#[cfg(test)]
mod tests {
    use super::{SchemaIssueKind, SchemaValidator};
    use crate::tooling::schema::{ParamType, ParameterSpec, ToolSchema};

    fn kinds(schema: &ToolSchema) -> Vec<SchemaIssueKind> {
        SchemaValidator::new()
            .validate_structure(schema)
            .issues
            .into_iter()
            .map(|issue| issue.kind)
            .collect()
    }

    #[test]
    fn well_formed_schema_has_no_issues() {
        let schema = ToolSchema::new(
            "create_item",
            vec![
                ParameterSpec::required("title", ParamType::String),
                ParameterSpec::optional("priority", ParamType::Enum)
                    .with_enum_values(["low", "high"])
                    .with_aliases(["prio"]),
            ],
        );

        assert!(SchemaValidator::new().validate_structure(&schema).is_ok());
    }

    #[test]
    fn flags_empty_names_unknown_types_and_empty_enums() {
        let schema = ToolSchema::new(
            " ",
            vec![
                ParameterSpec::required("", ParamType::String),
                ParameterSpec::optional("when", ParamType::Unrecognized("datetime".to_string())),
                ParameterSpec::optional("level", ParamType::Enum),
            ],
        );

        assert_eq!(
            kinds(&schema),
            vec![
                SchemaIssueKind::EmptyToolName,
                SchemaIssueKind::EmptyParameterName,
                SchemaIssueKind::UnrecognizedType,
                SchemaIssueKind::EmptyEnumValues,
            ]
        );
    }

    #[test]
    fn flags_allowed_values_on_non_enum_types() {
        let schema = ToolSchema::new(
            "set_tags",
            vec![
                ParameterSpec::optional("tags", ParamType::Array).with_enum_values(["a", "b"]),
                ParameterSpec::optional("level", ParamType::Enum).with_enum_values(["1", "2"]),
            ],
        );

        let validation = SchemaValidator::new().validate_structure(&schema);

        assert_eq!(
            validation.issues.iter().map(|issue| issue.kind).collect::<Vec<_>>(),
            vec![SchemaIssueKind::EnumOnNonEnumType]
        );
        assert_eq!(validation.issues[0].parameter.as_deref(), Some("tags"));
    }

    #[test]
    fn flags_duplicate_parameters_and_alias_collisions() {
        let schema = ToolSchema::new(
            "create_item",
            vec![
                ParameterSpec::required("title", ParamType::String).with_aliases(["summary"]),
                ParameterSpec::optional("title", ParamType::String),
                ParameterSpec::optional("body", ParamType::String).with_aliases(["summary", "title"]),
            ],
        );

        let validation = SchemaValidator::new().validate_structure(&schema);
        let found = validation.issues.iter().map(|issue| issue.kind).collect::<Vec<_>>();

        assert_eq!(
            found,
            vec![
                SchemaIssueKind::DuplicateParameter,
                SchemaIssueKind::AliasCollision,
                SchemaIssueKind::AliasCollision,
            ]
        );
        assert!(validation.issues[1].message.contains("`summary`"));
    }

    #[test]
    fn alias_equal_to_own_name_is_harmless() {
        let schema = ToolSchema::new(
            "search",
            vec![ParameterSpec::required("query", ParamType::String).with_aliases(["query", "q"])],
        );

        assert!(kinds(&schema).is_empty());
    }
}
