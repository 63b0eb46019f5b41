//! Shelfscout runtime: the tool-orchestration chat loop.
//!
//! This crate turns a free-text retail question into a sequence of
//! model-directed tool invocations and a final synthesized answer. It is
//! organized around these concepts:
//!
//! - **Model types** ([`model`]): provider-agnostic messages, tool calls and
//!   results, plus the Gemini backend that speaks the function-calling wire
//!   format.
//! - **ConnectionManager** ([`ConnectionManager`]): owns the model connection
//!   lifetime: single-flight establishment, transport-closed detection, and
//!   a single reconnect-and-retry.
//! - **ToolHost** ([`ToolHost`]): the boundary between the loop and side
//!   effects. Hosts never fail across this boundary; execution problems come
//!   back as error-flagged [`ToolResult`]s.
//! - **Session** ([`Session`]): per-turn conversation state, covering the
//!   history, the primed product context, and the running tool-call count.
//! - **TurnLoop** ([`TurnLoop`]): the state machine that alternates between
//!   model calls and tool dispatches until the model produces a final answer
//!   or the iteration cap is hit.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{ChatRequest, ConnectionManager, GeminiConnector, TurnOptions, handle_chat};
//!
//! # async fn example(tools: &impl runtime::ToolHost) {
//! let connector = GeminiConnector::new("AIza...", "gemini-2.0-flash");
//! let connection = ConnectionManager::new(connector);
//!
//! let response = handle_chat(
//!     &connection,
//!     tools,
//!     ChatRequest {
//!         message: "Is this product priced competitively?".into(),
//!         product_id: Some("sku-1042".into()),
//!         user_id: "user-7".into(),
//!     },
//!     TurnOptions::default(),
//! )
//! .await;
//! println!("{}", response.text.unwrap_or_default());
//! # }
//! ```

mod chat;
mod connection;
mod error;
pub mod model;
mod session;
pub mod tools;
mod turn;

// Model core types (provider-agnostic)
pub use model::{
    Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult, ToolSpec,
    Usage,
};

// Gemini backend
pub use model::{GeminiBackend, GeminiConnector};

// Connection management
pub use connection::{ConnectionManager, Connector, ModelConnection, is_transport_closed};

// Tool host boundary
pub use tools::{ToolError, ToolHost};

// Session and loop
pub use session::{PRODUCT_FETCH_TOOL, Session, TurnId};
pub use turn::{DEFAULT_MAX_TOOL_CALLS, TurnLoop, TurnOptions};

// Chat-turn boundary
pub use chat::{ChatRequest, ChatResponse, handle_chat};

// Error types
pub use error::{Error, Result};
