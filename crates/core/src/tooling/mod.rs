//! Tool-invocation building blocks: discovered schemas, the registry that
//! holds them, argument assembly, contract checks and response parsing.

pub mod arguments;
pub mod contract;
pub mod registry;
pub mod response;
pub mod schema;
pub mod validator;

use serde_json::Value;

/// Loose key/value data as it arrives from the conversation or a tool.
pub type ValueMap = serde_json::Map<String, Value>;

pub use arguments::{
    ArgumentBuilder, ArgumentDraft, ArgumentError, ArgumentSet, Resolution, ValueSource,
};
pub use contract::{ContractReport, ContractTester, ContractViolation};
pub use registry::{RegistryError, SchemaRegistry};
pub use response::{ResponseFormat, ResponseParser, ToolInvocationResult};
pub use schema::{DiscoveryError, ParamType, ParameterSpec, ToolSchema};
pub use validator::{SchemaIssue, SchemaIssueKind, SchemaValidation, SchemaValidator};
