//! Turn handling for the desk assistant.
//!
//! A turn flows through:
//! 1. **Routing** (`router`): keyword layers, then a deadline-bounded remote
//!    classification, then a looser keyword fallback. Always yields an intent.
//! 2. **Tool pipeline** (`tools`): for ticket and wiki handlers, resolve
//!    arguments against the discovered schema, check the contract, apply the
//!    guardrail policy (`guardrails`), invoke the transport and normalize the
//!    response.
//! 3. **Runtime** (`runtime`): ties the two together per turn and maps
//!    failures to user-safe interface errors.
//!
//! The LLM only labels the turn. Argument validity and call decisions are
//! deterministic.

pub mod guardrails;
pub mod llm;
pub mod router;
pub mod runtime;
pub mod tools;

pub use guardrails::{ContractPolicy, GuardrailDecision};
pub use llm::LlmClient;
pub use router::{DecisionSource, IntentRouter, RouterSettings, RoutingDecision};
pub use runtime::{AgentRuntime, TurnAction, TurnOutcome, TurnRequest};
pub use tools::{ToolCallError, ToolCallOutcome, ToolPipeline, ToolTransport};
