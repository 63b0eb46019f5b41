//! Tool dispatch and result normalization.

use runtime::{ToolCall, ToolHost, ToolResult, ToolSpec};
use serde_json::Value;
use tracing::debug;

use crate::registry::ToolRegistry;

/// The retail tool host.
///
/// Dispatches model-requested tool calls to registered handlers and
/// normalizes every outcome into a [`ToolResult`]: unknown names, malformed
/// arguments, and upstream failures all come back as error payloads so the
/// orchestration loop can report them to the model and continue.
pub struct RetailToolHost {
    registry: ToolRegistry,
}

impl RetailToolHost {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Models sometimes hand arguments back as a serialized string. Parse it
    /// into structured form where possible; fall back to the raw string.
    fn normalize_args(input: Value) -> Value {
        match input {
            Value::String(raw) => {
                serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw))
            }
            other => other,
        }
    }

    /// Canonical text form of a handler output. String outputs pass through
    /// unmodified so payloads replay byte-identical; structured outputs get
    /// one deterministic serialization.
    fn render_payload(value: &Value) -> String {
        match value {
            Value::String(text) => text.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

impl ToolHost for RetailToolHost {
    fn specs(&self) -> &[ToolSpec] {
        self.registry.specs()
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(handler) = self.registry.get(&call.name) else {
            return ToolResult::error(&call.name, format!("unknown tool: {}", call.name));
        };

        let args = Self::normalize_args(call.input.clone());
        debug!(tool = %call.name, "dispatching tool call");

        match handler.run(args).await {
            Ok(value) => ToolResult::success(&call.name, Self::render_payload(&value)),
            Err(err) => ToolResult::error(&call.name, err.to_string()),
        }
    }
}
