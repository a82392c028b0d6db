use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use deskpilot_core::tooling::{
    ArgumentBuilder, ArgumentError, ArgumentSet, ContractReport, ContractTester, DiscoveryError,
    RegistryError, ResponseFormat, ResponseParser, SchemaIssue, SchemaRegistry, SchemaValidation,
    SchemaValidator, ToolInvocationResult, ToolSchema, ValueMap,
};
use deskpilot_core::ApplicationError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::guardrails::{ContractPolicy, GuardrailDecision};

/// Remote tool-calling collaborator. Delivers already-deserialized payloads;
/// retries and the wire format are its concern.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn invoke(&self, tool: &str, arguments: &ArgumentSet) -> Result<Value>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error(transparent)]
    UnknownTool(#[from] RegistryError),
    #[error(transparent)]
    Unresolvable(#[from] ArgumentError),
    #[error("{}", .report.summary())]
    Rejected {
        report: ContractReport,
        reason_code: &'static str,
        user_message: String,
        fallback_path: &'static str,
    },
}

impl ToolCallError {
    /// Message suitable for showing to the person who asked.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { user_message, .. } => user_message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ToolCallError> for ApplicationError {
    fn from(value: ToolCallError) -> Self {
        match value {
            ToolCallError::UnknownTool(error) => Self::Registry(error),
            ToolCallError::Unresolvable(error) => Self::Argument(error),
            ToolCallError::Rejected { report, .. } => Self::Contract(report),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolCallOutcome {
    pub tool: String,
    pub arguments: ArgumentSet,
    pub dropped_parameters: Vec<String>,
    /// Set when the call went ahead without some details; explains which.
    pub notice: Option<String>,
    pub result: ToolInvocationResult,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    pub issues: Vec<(String, SchemaIssue)>,
    pub rejected: Vec<String>,
}

pub struct ToolPipeline {
    registry: Arc<SchemaRegistry>,
    transport: Arc<dyn ToolTransport>,
    policy: ContractPolicy,
    expected_format: Option<ResponseFormat>,
    builder: ArgumentBuilder,
    tester: ContractTester,
    validator: SchemaValidator,
    parser: ResponseParser,
}

impl ToolPipeline {
    pub fn new(registry: Arc<SchemaRegistry>, transport: Arc<dyn ToolTransport>) -> Self {
        Self {
            registry,
            transport,
            policy: ContractPolicy::default(),
            expected_format: None,
            builder: ArgumentBuilder::new(),
            tester: ContractTester::new(),
            validator: SchemaValidator::new(),
            parser: ResponseParser::new(),
        }
    }

    pub fn with_policy(mut self, policy: ContractPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_expected_format(mut self, expected_format: Option<ResponseFormat>) -> Self {
        self.expected_format = expected_format;
        self
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Validates and stores one schema. Issues are advisory and logged.
    pub fn register(&self, schema: ToolSchema) -> SchemaValidation {
        let validation = self.validator.validate_structure(&schema);
        log_issues(&schema.name, &validation);
        self.registry.register(schema);
        validation
    }

    /// Replaces the catalogue with a discovery listing.
    pub fn register_discovered(&self, listing: &Value) -> DiscoveryReport {
        let (schemas, errors) = ToolSchema::from_discovery_listing(listing);
        let mut report = DiscoveryReport::default();

        for error in &errors {
            warn!(
                event_name = "agent.tools.discovery_rejected",
                error = %error,
                "tool descriptor could not be parsed"
            );
        }
        report.rejected = errors.iter().map(DiscoveryError::to_string).collect();

        for schema in &schemas {
            let validation = self.validator.validate_structure(schema);
            log_issues(&schema.name, &validation);
            report
                .issues
                .extend(validation.issues.into_iter().map(|issue| (schema.name.clone(), issue)));
            report.registered.push(schema.name.clone());
        }

        self.registry.replace_all(schemas);
        report
    }

    /// Runs one tool call: lookup, resolution, contract check, guardrail,
    /// invocation and response normalization.
    pub async fn call(
        &self,
        tool: &str,
        data: &ValueMap,
        context: &ValueMap,
        correlation_id: &str,
    ) -> Result<ToolCallOutcome, ToolCallError> {
        // Held for the whole call; a concurrent re-discovery does not affect it.
        let schema = self.registry.lookup(tool)?;

        let draft = self.builder.resolve(&schema, data, context);
        for resolution in &draft.resolutions {
            debug!(
                event_name = "agent.tools.parameter_resolved",
                correlation_id = %correlation_id,
                tool = %schema.name,
                parameter = %resolution.parameter,
                source = ?resolution.source,
                key = %resolution.key,
                coerced = resolution.coerced,
                "tool parameter resolved"
            );
        }
        if let Some(parameter) = draft.unresolved_required.first() {
            warn!(
                event_name = "agent.tools.unresolvable_parameter",
                correlation_id = %correlation_id,
                tool = %schema.name,
                parameter = %parameter,
                "required tool parameter could not be resolved"
            );
            return Err(ArgumentError::UnresolvableParameter {
                tool: schema.name.clone(),
                parameter: parameter.clone(),
            }
            .into());
        }

        let report = self.tester.check(&schema, draft.arguments.as_map());
        let (arguments, dropped_parameters, notice) = match self.policy.evaluate(&schema, &report) {
            GuardrailDecision::Allow => (draft.arguments, Vec::new(), None),
            GuardrailDecision::Degrade {
                reason_code,
                user_message,
                fallback_path,
                dropped_parameters,
            } => {
                info!(
                    event_name = "agent.tools.contract_degraded",
                    correlation_id = %correlation_id,
                    tool = %schema.name,
                    reason_code,
                    fallback_path,
                    dropped = ?dropped_parameters,
                    "invalid optional tool parameters dropped"
                );
                let arguments =
                    draft.arguments.without(dropped_parameters.iter().map(String::as_str));
                (arguments, dropped_parameters, Some(user_message))
            }
            GuardrailDecision::Deny { reason_code, user_message, fallback_path } => {
                warn!(
                    event_name = "agent.tools.contract_rejected",
                    correlation_id = %correlation_id,
                    tool = %schema.name,
                    reason_code,
                    violations = %report.summary(),
                    "tool call rejected before invocation"
                );
                return Err(ToolCallError::Rejected {
                    report,
                    reason_code,
                    user_message,
                    fallback_path,
                });
            }
        };

        let result = match self.transport.invoke(&schema.name, &arguments).await {
            Ok(raw) => self.parser.parse(&raw, self.expected_format),
            Err(error) => ToolInvocationResult::failure(
                format!("tool transport failed: {error:#}"),
                Value::Null,
            ),
        };

        info!(
            event_name = "agent.tools.invoked",
            correlation_id = %correlation_id,
            tool = %schema.name,
            success = result.success,
            id = result.id.as_deref().unwrap_or(""),
            "tool invocation finished"
        );

        Ok(ToolCallOutcome {
            tool: schema.name.clone(),
            arguments,
            dropped_parameters,
            notice,
            result,
        })
    }
}

fn log_issues(tool: &str, validation: &SchemaValidation) {
    for issue in &validation.issues {
        warn!(
            event_name = "agent.tools.schema_issue",
            tool = %tool,
            kind = ?issue.kind,
            parameter = issue.parameter.as_deref().unwrap_or(""),
            "{issue}"
        );
    }
}
