use deskpilot_core::tooling::{ContractReport, ContractViolation, ToolSchema};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    Degrade {
        reason_code: &'static str,
        user_message: String,
        fallback_path: &'static str,
        dropped_parameters: Vec<String>,
    },
}

/// Decides whether a call may proceed given its contract report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractPolicy {
    pub drop_invalid_optional: bool,
}

impl Default for ContractPolicy {
    fn default() -> Self {
        Self { drop_invalid_optional: true }
    }
}

impl ContractPolicy {
    pub fn evaluate(&self, schema: &ToolSchema, report: &ContractReport) -> GuardrailDecision {
        if report.is_clean() {
            return GuardrailDecision::Allow;
        }

        let (required, optional) = report.partition(schema);

        if required.iter().any(|violation| matches!(violation, ContractViolation::MissingRequired { .. })) {
            return GuardrailDecision::Deny {
                reason_code: "missing_required_parameter",
                user_message: format!(
                    "I need more details before I can use {}: {}.",
                    schema.name,
                    describe(&required)
                ),
                fallback_path: "request_missing_details",
            };
        }

        if !required.is_empty() {
            return GuardrailDecision::Deny {
                reason_code: "invalid_required_parameter",
                user_message: format!(
                    "Some details for {} are not in a form it accepts: {}.",
                    schema.name,
                    describe(&required)
                ),
                fallback_path: "request_corrected_arguments",
            };
        }

        if !self.drop_invalid_optional {
            return GuardrailDecision::Deny {
                reason_code: "invalid_optional_parameter",
                user_message: format!(
                    "Some optional details for {} are not in a form it accepts: {}.",
                    schema.name,
                    describe(&optional)
                ),
                fallback_path: "request_corrected_arguments",
            };
        }

        let mut dropped_parameters =
            optional.iter().map(|violation| violation.param().to_string()).collect::<Vec<_>>();
        dropped_parameters.dedup();
        GuardrailDecision::Degrade {
            reason_code: "invalid_optional_parameter_dropped",
            user_message: format!(
                "I left out details {} did not accept: {}.",
                schema.name,
                describe(&optional)
            ),
            fallback_path: "invoke_without_invalid_optional",
            dropped_parameters,
        }
    }
}

fn describe(violations: &[&ContractViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use deskpilot_core::tooling::{
        ContractReport, ContractViolation, ParamType, ParameterSpec, ToolSchema,
    };

    use super::{ContractPolicy, GuardrailDecision};

    fn schema() -> ToolSchema {
        ToolSchema::new(
            "create_issue",
            vec![
                ParameterSpec::required("title", ParamType::String),
                ParameterSpec::optional("priority", ParamType::Enum)
                    .with_enum_values(["low", "high"]),
            ],
        )
    }

    fn report(violations: Vec<ContractViolation>) -> ContractReport {
        ContractReport { tool: "create_issue".to_string(), violations }
    }

    fn invalid_priority() -> ContractViolation {
        ContractViolation::InvalidEnumValue {
            param: "priority".to_string(),
            value: "urgent".to_string(),
            allowed: ["low", "high"].into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn clean_report_is_allowed() {
        let decision = ContractPolicy::default().evaluate(&schema(), &report(Vec::new()));
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn missing_required_parameter_is_denied() {
        let decision = ContractPolicy::default().evaluate(
            &schema(),
            &report(vec![
                ContractViolation::MissingRequired { param: "title".to_string() },
                invalid_priority(),
            ]),
        );

        let (reason_code, user_message, fallback_path) = match decision {
            GuardrailDecision::Deny { reason_code, user_message, fallback_path } => {
                (reason_code, user_message, fallback_path)
            }
            _ => ("", String::new(), ""),
        };

        assert_eq!(reason_code, "missing_required_parameter");
        assert!(user_message.contains("`title` is required"));
        assert_eq!(fallback_path, "request_missing_details");
    }

    #[test]
    fn invalid_optional_parameter_is_dropped() {
        let decision = ContractPolicy::default().evaluate(&schema(), &report(vec![invalid_priority()]));

        let dropped = match decision {
            GuardrailDecision::Degrade { reason_code, dropped_parameters, .. } => {
                assert_eq!(reason_code, "invalid_optional_parameter_dropped");
                dropped_parameters
            }
            _ => Vec::new(),
        };
        assert_eq!(dropped, vec!["priority".to_string()]);
    }

    #[test]
    fn strict_policy_denies_invalid_optional_parameter() {
        let policy = ContractPolicy { drop_invalid_optional: false };
        let decision = policy.evaluate(&schema(), &report(vec![invalid_priority()]));

        assert!(matches!(
            decision,
            GuardrailDecision::Deny { reason_code: "invalid_optional_parameter", .. }
        ));
    }

    #[test]
    fn wrong_type_on_required_parameter_is_denied() {
        let decision = ContractPolicy::default().evaluate(
            &schema(),
            &report(vec![ContractViolation::TypeMismatch {
                param: "title".to_string(),
                expected_type: "string".to_string(),
                actual_type: "object".to_string(),
            }]),
        );

        assert!(matches!(
            decision,
            GuardrailDecision::Deny { fallback_path: "request_corrected_arguments", .. }
        ));
    }
}
