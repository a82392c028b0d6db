use std::sync::Arc;

use deskpilot_core::config::AppConfig;
use deskpilot_core::tooling::{SchemaRegistry, ValueMap};
use deskpilot_core::{ApplicationError, HandlerId, InterfaceError};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::guardrails::ContractPolicy;
use crate::llm::LlmClient;
use crate::router::{IntentRouter, RouterSettings, RoutingDecision};
use crate::tools::{ToolCallOutcome, ToolPipeline, ToolTransport};

/// Key under which the raw turn text is offered to tool argument resolution.
pub const TURN_TEXT_KEY: &str = "text";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolBindings {
    pub ticket_tool: String,
    pub wiki_tool: String,
}

impl ToolBindings {
    pub fn tool_for(&self, handler: HandlerId) -> Option<&str> {
        match handler {
            HandlerId::Ticket => Some(self.ticket_tool.as_str()),
            HandlerId::Wiki => Some(self.wiki_tool.as_str()),
            HandlerId::AgentPlatform | HandlerId::Chat => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TurnRequest {
    pub text: String,
    pub data: ValueMap,
    pub context: ValueMap,
    pub correlation_id: Option<String>,
}

impl TurnRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TurnAction {
    Invoked { outcome: ToolCallOutcome },
    /// Handled by a collaborator outside this crate.
    Delegated { handler: HandlerId },
    Failed { error: InterfaceError, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub correlation_id: String,
    pub decision: RoutingDecision,
    pub action: TurnAction,
}

pub struct AgentRuntime {
    router: IntentRouter,
    pipeline: ToolPipeline,
    bindings: ToolBindings,
}

impl AgentRuntime {
    pub fn new(router: IntentRouter, pipeline: ToolPipeline, bindings: ToolBindings) -> Self {
        Self { router, pipeline, bindings }
    }

    /// Builds a runtime from validated configuration; invalid settings such
    /// as a blank tool binding surface as `ApplicationError::Configuration`.
    pub fn from_config(
        config: &AppConfig,
        classifier: Option<Arc<dyn LlmClient>>,
        registry: Arc<SchemaRegistry>,
        transport: Arc<dyn ToolTransport>,
    ) -> Result<Self, ApplicationError> {
        config.validate().map_err(|error| ApplicationError::Configuration(error.to_string()))?;

        let router = IntentRouter::new(RouterSettings::from(&config.routing), classifier);
        let pipeline = ToolPipeline::new(registry, transport)
            .with_policy(ContractPolicy { drop_invalid_optional: config.tools.drop_invalid_optional })
            .with_expected_format(config.tools.expected_format);
        let bindings = ToolBindings {
            ticket_tool: config.tools.ticket_tool.clone(),
            wiki_tool: config.tools.wiki_tool.clone(),
        };
        Ok(Self::new(router, pipeline, bindings))
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn pipeline(&self) -> &ToolPipeline {
        &self.pipeline
    }

    /// Routes one turn and, for ticket and wiki handlers, runs the bound tool.
    /// Caller-actionable problems come back as `TurnAction::Failed`.
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnOutcome {
        let correlation_id =
            request.correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let decision = self.router.route(&request.text, &correlation_id).await;

        let Some(tool) = self.bindings.tool_for(decision.handler) else {
            info!(
                event_name = "agent.runtime.delegated",
                correlation_id = %correlation_id,
                handler = %decision.handler,
                "turn delegated to external handler"
            );
            let action = TurnAction::Delegated { handler: decision.handler };
            return TurnOutcome { correlation_id, decision, action };
        };

        let mut data = request.data;
        data.entry(TURN_TEXT_KEY.to_string()).or_insert_with(|| Value::String(request.text.clone()));

        let action = match self.pipeline.call(tool, &data, &request.context, &correlation_id).await {
            Ok(outcome) => TurnAction::Invoked { outcome },
            Err(error) => {
                let user_message = error.user_message();
                let error = ApplicationError::from(error);
                if error.is_caller_actionable() {
                    info!(
                        event_name = "agent.runtime.tool_call_failed",
                        correlation_id = %correlation_id,
                        handler = %decision.handler,
                        error = %error,
                        "tool call needs corrected input"
                    );
                } else {
                    warn!(
                        event_name = "agent.runtime.tool_call_failed",
                        correlation_id = %correlation_id,
                        handler = %decision.handler,
                        error = %error,
                        "tool call could not be made"
                    );
                }
                let error = error.into_interface(correlation_id.clone());
                TurnAction::Failed { error, user_message }
            }
        };

        TurnOutcome { correlation_id, decision, action }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use deskpilot_core::config::AppConfig;
    use deskpilot_core::tooling::{ArgumentSet, ParamType, ParameterSpec, SchemaRegistry, ToolSchema};
    use deskpilot_core::{ApplicationError, HandlerId, Intent, InterfaceError};
    use serde_json::{json, Value};

    use super::{AgentRuntime, TurnAction, TurnRequest};
    use crate::llm::LlmClient;
    use crate::tools::ToolTransport;

    struct EchoTransport;

    #[async_trait]
    impl ToolTransport for EchoTransport {
        async fn invoke(&self, tool: &str, arguments: &ArgumentSet) -> Result<Value> {
            Ok(json!({
                "content": [{
                    "type": "text",
                    "text": json!({"key": format!("{tool}-1"), "echo": arguments}).to_string()
                }]
            }))
        }
    }

    struct Label(&'static str);

    #[async_trait]
    impl LlmClient for Label {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn runtime(classifier: Option<Arc<dyn LlmClient>>) -> AgentRuntime {
        let registry = Arc::new(SchemaRegistry::new());
        registry.register(ToolSchema::new(
            "create_issue",
            vec![
                ParameterSpec::required("summary", ParamType::String).with_aliases(["text"]),
                ParameterSpec::optional("project", ParamType::String),
            ],
        ));
        registry.register(ToolSchema::new(
            "search_pages",
            vec![
                ParameterSpec::required("query", ParamType::String).with_aliases(["text", "q"]),
                ParameterSpec::required("space", ParamType::String),
            ],
        ));
        AgentRuntime::from_config(&AppConfig::default(), classifier, registry, Arc::new(EchoTransport))
            .expect("default configuration is valid")
    }

    #[tokio::test]
    async fn ticket_turn_invokes_the_ticket_tool_with_the_turn_text() {
        let mut request = TurnRequest::new("please open a ticket: printer on 3rd floor is jammed");
        request.correlation_id = Some("turn-1".to_string());
        request.context.insert("project".to_string(), json!("OPS"));

        let outcome = runtime(None).handle_turn(request).await;

        assert_eq!(outcome.correlation_id, "turn-1");
        assert_eq!(outcome.decision.intent, Intent::TicketCreation);
        match outcome.action {
            TurnAction::Invoked { outcome } => {
                assert_eq!(outcome.tool, "create_issue");
                assert!(outcome.result.success);
                assert_eq!(outcome.result.id.as_deref(), Some("create_issue-1"));
                assert_eq!(outcome.arguments.get("project"), Some(&json!("OPS")));
                assert_eq!(
                    outcome.arguments.get("summary"),
                    Some(&json!("please open a ticket: printer on 3rd floor is jammed"))
                );
            }
            other => panic!("expected a tool invocation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wiki_turn_missing_required_parameter_fails_with_its_name() {
        let outcome =
            runtime(None).handle_turn(TurnRequest::new("where is the wiki page on VPN?")).await;

        assert_eq!(outcome.decision.handler, HandlerId::Wiki);
        assert!(!outcome.correlation_id.is_empty());
        match outcome.action {
            TurnAction::Failed { error, user_message } => {
                assert!(matches!(error, InterfaceError::BadRequest { .. }));
                assert!(user_message.contains("`space`"));
                assert_eq!(error.correlation_id(), outcome.correlation_id);
            }
            other => panic!("expected a failed turn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_and_agent_turns_are_delegated() {
        let runtime = runtime(Some(Arc::new(Label("general_chat"))));

        let chat = runtime.handle_turn(TurnRequest::new("good morning")).await;
        assert_eq!(chat.action, TurnAction::Delegated { handler: HandlerId::Chat });

        let agent = runtime.handle_turn(TurnRequest::new("handoff to the sales bot")).await;
        assert_eq!(agent.action, TurnAction::Delegated { handler: HandlerId::AgentPlatform });
    }

    #[test]
    fn invalid_configuration_is_reported_before_any_turn() {
        let mut config = AppConfig::default();
        config.tools.wiki_tool = "  ".to_string();

        let error = AgentRuntime::from_config(
            &config,
            None,
            Arc::new(SchemaRegistry::new()),
            Arc::new(EchoTransport),
        )
        .err()
        .expect("blank wiki tool should be rejected");

        assert!(matches!(error, ApplicationError::Configuration(_)));
        assert!(!error.is_caller_actionable());
        assert!(matches!(error.into_interface("boot"), InterfaceError::Internal { .. }));
    }
}
