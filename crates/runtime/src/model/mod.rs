//! Provider-agnostic model types and backends.

mod backend;
mod errors;
mod types;

pub use backend::{GeminiBackend, GeminiConnector};
pub use errors::ModelError;
pub use types::{
    Message, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult, ToolSpec, Usage,
};
