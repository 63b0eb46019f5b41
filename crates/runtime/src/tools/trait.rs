//! Tool host trait.

use crate::model::{ToolCall, ToolResult, ToolSpec};
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide tool specifications and execute tool calls.
/// This is the boundary between the model loop and side effects. Execution
/// never fails across it: unknown tools, bad arguments, and upstream
/// failures all come back as [`ToolResult`]s with `is_error` set, so the
/// loop can report them to the model and continue.
pub trait ToolHost: Send + Sync {
    /// Get available tool specifications.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = ToolResult> + Send;
}
