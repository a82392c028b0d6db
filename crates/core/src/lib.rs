pub mod config;
pub mod errors;
pub mod intent;
pub mod tooling;

pub use errors::{ApplicationError, InterfaceError};
pub use intent::{HandlerId, Intent};
pub use tooling::{
    ArgumentBuilder, ArgumentDraft, ArgumentError, ArgumentSet, ContractReport, ContractTester,
    ContractViolation, ParamType, ParameterSpec, RegistryError, ResponseFormat, ResponseParser,
    SchemaRegistry, SchemaValidator, ToolInvocationResult, ToolSchema, ValueMap,
};
