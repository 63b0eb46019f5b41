//! Per-turn conversation state.

use std::collections::HashSet;

use uuid::Uuid;

use crate::model::{Message, ToolResult};

/// The canonical product-fetch tool. When a product context is supplied, this
/// must be the first tool executed so downstream reasoning has authoritative
/// product data.
pub const PRODUCT_FETCH_TOOL: &str = "fetch_product_details";

/// A unique identifier for one chat turn, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation state for one in-flight chat turn.
///
/// Owned exclusively by one turn, mutated throughout the loop, discarded when
/// the loop terminates. `tool_call_count` only increases; `executed_tools`
/// records which tool kinds have successfully run at least once.
pub struct Session {
    id: TurnId,
    user_id: String,
    product_context: Option<String>,
    history: Vec<Message>,
    tool_call_count: u32,
    executed_tools: HashSet<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            user_id: user_id.into(),
            product_context: None,
            history: Vec::new(),
            tool_call_count: 0,
            executed_tools: HashSet::new(),
        }
    }

    /// Attach the selected product, activating the fetch-first policy.
    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_context = Some(product_id.into());
        self
    }

    /// Seed history with the turn context and the user's message.
    ///
    /// If a product is selected, the seed instructs that the canonical
    /// product-fetch tool be the first tool invoked.
    pub fn seed(&mut self, message: &str) {
        let mut context = format!(
            "You are assisting user {} with retail pricing and demand questions.",
            self.user_id
        );
        if let Some(product_id) = &self.product_context {
            context.push_str(&format!(
                " The user currently has product \"{product_id}\" selected. Before using any \
                 other tool, call {PRODUCT_FETCH_TOOL} with this product id to load the \
                 authoritative product record, then continue with the request."
            ));
        }
        self.history.push(Message::system(context));
        self.history.push(Message::user(message));
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn product_context(&self) -> Option<&str> {
        self.product_context.as_deref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn tool_call_count(&self) -> u32 {
        self.tool_call_count
    }

    /// Count one tool invocation toward the iteration cap.
    pub fn record_invocation(&mut self) {
        self.tool_call_count += 1;
    }

    /// Record a completed execution; successful tools unlock the ordering
    /// policy.
    pub fn record_result(&mut self, result: &ToolResult) {
        if !result.is_error {
            self.executed_tools.insert(result.tool_name.clone());
        }
    }

    /// Whether the fetch-first policy is still pending: a product is selected
    /// and no tool has successfully executed yet.
    pub fn requires_product_fetch(&self) -> bool {
        self.product_context.is_some() && self.executed_tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_without_product_has_no_fetch_instruction() {
        let mut session = Session::new("user-1");
        session.seed("what sells well?");
        assert_eq!(session.history().len(), 2);
        assert!(!session.history()[0].text().contains(PRODUCT_FETCH_TOOL));
        assert!(!session.requires_product_fetch());
    }

    #[test]
    fn seed_with_product_instructs_fetch_first() {
        let mut session = Session::new("user-1").with_product("sku-9");
        session.seed("price this");
        assert!(session.history()[0].text().contains(PRODUCT_FETCH_TOOL));
        assert!(session.history()[0].text().contains("sku-9"));
        assert!(session.requires_product_fetch());
    }

    #[test]
    fn successful_result_releases_policy() {
        let mut session = Session::new("user-1").with_product("sku-9");
        session.record_result(&ToolResult::error(PRODUCT_FETCH_TOOL, "boom"));
        assert!(session.requires_product_fetch());

        session.record_result(&ToolResult::success(PRODUCT_FETCH_TOOL, "{}"));
        assert!(!session.requires_product_fetch());
    }

    #[test]
    fn invocation_count_is_monotonic() {
        let mut session = Session::new("user-1");
        session.record_invocation();
        session.record_invocation();
        assert_eq!(session.tool_call_count(), 2);
    }
}
