//! Explicit tool registration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use runtime::{ToolError, ToolSpec};
use serde_json::Value;

/// A single invocable capability.
///
/// Handlers own their spec (name, description, input schema) and their side
/// effects. Errors returned here are rendered into error payloads by the
/// executor; they never escape the host boundary.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn run(&self, args: Value) -> Result<Value, ToolError>;
}

/// Name-keyed map of tool handlers.
///
/// Registration is explicit and happens once at process start; the spec list
/// is advertised to the model at the start of every turn.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its spec name, replacing any previous
    /// handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let spec = handler.spec();
        self.specs.retain(|s| s.name != spec.name);
        self.handlers.insert(spec.name.clone(), handler);
        self.specs.push(spec);
    }

    /// All registered specs, in registration order.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".into(),
                description: "Echo the arguments".into(),
                schema: json!({"type": "object"}),
            }
        }

        async fn run(&self, args: Value) -> Result<Value, ToolError> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn register_and_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        assert_eq!(registry.specs().len(), 1);

        let handler = registry.get("echo").unwrap();
        let out = handler.run(json!({"a": 1})).await.unwrap();
        assert_eq!(out["a"], 1);
    }

    #[test]
    fn re_registration_replaces_spec() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(Echo));
        assert_eq!(registry.specs().len(), 1);
        assert_eq!(registry.len(), 1);
    }
}
