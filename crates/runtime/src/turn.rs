//! The tool-orchestration state machine.
//!
//! One [`TurnLoop`] instance drives one chat turn: it alternates between
//! model calls and tool dispatches until the model produces a final answer
//! with no further tool request, or the iteration cap is hit. Exactly one
//! tool call is processed per iteration; when the model requests several,
//! only the first is honored.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionManager, Connector};
use crate::error::{Error, Result};
use crate::model::{Message, ToolCall, ToolResult, ToolSpec};
use crate::session::{PRODUCT_FETCH_TOOL, Session};
use crate::tools::ToolHost;

/// Hard ceiling on tool invocations per turn.
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 20;

/// Default bound for a single tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for one chat turn.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    pub max_tool_calls: u32,
    pub tool_timeout: Duration,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

/// Loop states. `Failed` is represented by returning `Err` from the driver.
enum LoopState {
    AwaitingModel,
    PolicyCheck(ToolCall),
    Executing(ToolCall),
    Done(String),
}

/// The orchestration loop for one chat turn.
pub struct TurnLoop<'a, C: Connector, H: ToolHost> {
    connection: &'a ConnectionManager<C>,
    tools: &'a H,
    session: Session,
    options: TurnOptions,
}

impl<'a, C: Connector, H: ToolHost> TurnLoop<'a, C, H> {
    pub fn new(connection: &'a ConnectionManager<C>, tools: &'a H, session: Session) -> Self {
        Self {
            connection,
            tools,
            session,
            options: TurnOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    /// Drive the state machine to completion, returning the model's final
    /// text.
    pub async fn run(mut self) -> Result<String> {
        let tools = self.tools;
        let specs = tools.specs();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => self.await_model(specs).await?,
                LoopState::PolicyCheck(call) => self.check_policy(call),
                LoopState::Executing(call) => self.execute_tool(call).await?,
                LoopState::Done(text) => {
                    info!(
                        turn = %self.session.id(),
                        tool_calls = self.session.tool_call_count(),
                        "turn complete"
                    );
                    return Ok(text);
                }
            };
        }
    }

    async fn await_model(&mut self, specs: &[ToolSpec]) -> Result<LoopState> {
        let response = self.connection.send(self.session.history(), specs).await?;
        let message = response.message;
        let text = message.text();
        let calls = message.tool_calls();
        self.session.push(message);

        if calls.len() > 1 {
            warn!(
                turn = %self.session.id(),
                ignored = calls.len() - 1,
                "model requested multiple tools, honoring the first"
            );
        }
        match calls.into_iter().next() {
            None => Ok(LoopState::Done(text)),
            Some(call) => {
                debug!(turn = %self.session.id(), tool = %call.name, "model requested tool");
                Ok(LoopState::PolicyCheck(call))
            }
        }
    }

    /// Enforce the fetch-first ordering policy. A deferred call re-prompts
    /// the model without counting toward the iteration cap.
    fn check_policy(&mut self, call: ToolCall) -> LoopState {
        if !self.session.requires_product_fetch() || call.name == PRODUCT_FETCH_TOOL {
            return LoopState::Executing(call);
        }

        let product_id = self.session.product_context().unwrap_or_default().to_string();
        warn!(
            turn = %self.session.id(),
            requested = %call.name,
            "deferring tool until product fetch"
        );
        self.session.push(Message::user(format!(
            "Do not call {} yet. Call {PRODUCT_FETCH_TOOL} with product id \"{product_id}\" \
             first so you have the authoritative product record, then continue.",
            call.name
        )));
        LoopState::AwaitingModel
    }

    async fn execute_tool(&mut self, call: ToolCall) -> Result<LoopState> {
        if self.session.tool_call_count() >= self.options.max_tool_calls {
            warn!(
                turn = %self.session.id(),
                cap = self.options.max_tool_calls,
                "iteration cap exceeded"
            );
            return Err(Error::IterationCapExceeded(self.options.max_tool_calls));
        }
        self.session.record_invocation();

        info!(
            turn = %self.session.id(),
            tool = %call.name,
            invocation = self.session.tool_call_count(),
            "executing tool"
        );
        let result = match timeout(self.options.tool_timeout, self.tools.execute(&call)).await {
            Ok(result) => result,
            Err(_) => ToolResult::error(
                &call.name,
                format!(
                    "tool {} timed out after {:?}",
                    call.name, self.options.tool_timeout
                ),
            ),
        };

        self.session.record_result(&result);
        self.session.push(Message::tool_result(result));
        Ok(LoopState::AwaitingModel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ModelConnection, is_transport_closed};
    use crate::model::{ModelError, ModelRequest, ModelResponse, Part, Usage};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    struct Shared {
        script: Mutex<VecDeque<ModelResponse>>,
        // Every message history the mock model was shown.
        seen: Mutex<Vec<Vec<Message>>>,
    }

    struct ScriptedConnector(Arc<Shared>);
    struct ScriptedConn(Arc<Shared>);

    impl Connector for ScriptedConnector {
        type Conn = ScriptedConn;
        async fn connect(&self) -> std::result::Result<ScriptedConn, ModelError> {
            Ok(ScriptedConn(Arc::clone(&self.0)))
        }
    }

    impl ModelConnection for ScriptedConn {
        async fn send(
            &self,
            request: ModelRequest<'_>,
        ) -> std::result::Result<ModelResponse, ModelError> {
            self.0.seen.lock().await.push(request.messages.to_vec());
            self.0
                .script
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| ModelError::Api("script exhausted".into()))
        }
    }

    struct MockHost {
        specs: Vec<ToolSpec>,
        executions: AtomicUsize,
    }

    impl MockHost {
        fn new() -> Self {
            let specs = [PRODUCT_FETCH_TOOL, "youtube_search", "google_search"]
                .iter()
                .map(|name| ToolSpec {
                    name: (*name).to_string(),
                    description: String::new(),
                    schema: json!({"type": "object"}),
                })
                .collect();
            Self {
                specs,
                executions: AtomicUsize::new(0),
            }
        }
    }

    impl ToolHost for MockHost {
        fn specs(&self) -> &[ToolSpec] {
            &self.specs
        }

        async fn execute(&self, call: &ToolCall) -> ToolResult {
            self.executions.fetch_add(1, Ordering::SeqCst);
            match call.name.as_str() {
                PRODUCT_FETCH_TOOL => {
                    ToolResult::success(&call.name, r#"{"id":"sku-9","price":19.99}"#)
                }
                "youtube_search" => {
                    ToolResult::success(&call.name, "{\"hits\":[],\"note\":\"héllo\\n\"}")
                }
                other => ToolResult::error(other, format!("unknown tool: {other}")),
            }
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            message: Message::assistant(text),
            usage: Usage::default(),
        }
    }

    fn call_response(name: &str) -> ModelResponse {
        ModelResponse {
            message: Message {
                role: crate::model::Role::Assistant,
                parts: vec![Part::ToolCall(ToolCall {
                    name: name.into(),
                    input: Value::Null,
                })],
            },
            usage: Usage::default(),
        }
    }

    fn setup(
        script: Vec<ModelResponse>,
    ) -> (ConnectionManager<ScriptedConnector>, Arc<Shared>) {
        let shared = Arc::new(Shared {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        });
        (
            ConnectionManager::new(ScriptedConnector(Arc::clone(&shared))),
            shared,
        )
    }

    #[tokio::test]
    async fn final_answer_without_tools() {
        let (connection, _) = setup(vec![text_response("demand looks steady")]);
        let host = MockHost::new();
        let mut session = Session::new("user-1");
        session.seed("how is demand?");

        let text = TurnLoop::new(&connection, &host, session).run().await.unwrap();
        assert_eq!(text, "demand looks steady");
        assert_eq!(host.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn off_policy_first_call_is_nudged_not_counted() {
        let (connection, shared) = setup(vec![
            call_response("youtube_search"),
            call_response(PRODUCT_FETCH_TOOL),
            text_response("done"),
        ]);
        let host = MockHost::new();
        let mut session = Session::new("user-1").with_product("sku-9");
        session.seed("price check");

        // Cap of 1: if the deferred call had been counted, the product fetch
        // would blow the cap and the turn would fail.
        let options = TurnOptions {
            max_tool_calls: 1,
            ..TurnOptions::default()
        };
        let text = TurnLoop::new(&connection, &host, session)
            .with_options(options)
            .run()
            .await
            .unwrap();
        assert_eq!(text, "done");
        assert_eq!(host.executions.load(Ordering::SeqCst), 1);

        // The second model request must carry a corrective instruction, not a
        // tool result.
        let seen = shared.seen.lock().await;
        let corrective = seen[1].last().unwrap();
        assert!(corrective.text().contains(PRODUCT_FETCH_TOOL));
        assert!(corrective.text().contains("sku-9"));
    }

    #[tokio::test]
    async fn unknown_tool_result_feeds_back_and_loop_continues() {
        let (connection, shared) = setup(vec![
            call_response("rank_everything"),
            text_response("recovered"),
        ]);
        let host = MockHost::new();
        let mut session = Session::new("user-1");
        session.seed("hi");

        let text = TurnLoop::new(&connection, &host, session).run().await.unwrap();
        assert_eq!(text, "recovered");

        let seen = shared.seen.lock().await;
        let replay = seen[1]
            .iter()
            .flat_map(|m| m.parts.iter())
            .find_map(|p| match p {
                Part::ToolResult(r) => Some(r.clone()),
                _ => None,
            })
            .expect("tool result replayed to model");
        assert!(replay.is_error);
        assert!(replay.payload.contains("rank_everything"));
    }

    #[tokio::test]
    async fn iteration_cap_fails_the_turn() {
        let script = (0..4).map(|_| call_response("youtube_search")).collect();
        let (connection, _) = setup(script);
        let host = MockHost::new();
        let mut session = Session::new("user-1");
        session.seed("keep going");

        let options = TurnOptions {
            max_tool_calls: 2,
            ..TurnOptions::default()
        };
        let err = TurnLoop::new(&connection, &host, session)
            .with_options(options)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IterationCapExceeded(2)));
        assert_eq!(host.executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tool_payload_replays_byte_identical() {
        let (connection, shared) = setup(vec![
            call_response("youtube_search"),
            text_response("ok"),
        ]);
        let host = MockHost::new();
        let mut session = Session::new("user-1");
        session.seed("search");

        TurnLoop::new(&connection, &host, session).run().await.unwrap();

        let expected = host
            .execute(&ToolCall {
                name: "youtube_search".into(),
                input: Value::Null,
            })
            .await;
        let seen = shared.seen.lock().await;
        let replayed = seen[1]
            .iter()
            .flat_map(|m| m.parts.iter())
            .find_map(|p| match p {
                Part::ToolResult(r) => Some(r.payload.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(replayed, expected.payload);
    }

    #[tokio::test]
    async fn transport_closed_mid_turn_recovers() {
        // First model call dies with a closed transport; the manager
        // reconnects and the retry serves the scripted answer.
        struct FlakyShared {
            failures: AtomicUsize,
        }
        struct FlakyConnector(Arc<FlakyShared>);
        struct FlakyConn(Arc<FlakyShared>);

        impl Connector for FlakyConnector {
            type Conn = FlakyConn;
            async fn connect(&self) -> std::result::Result<FlakyConn, ModelError> {
                Ok(FlakyConn(Arc::clone(&self.0)))
            }
        }
        impl ModelConnection for FlakyConn {
            async fn send(
                &self,
                _request: ModelRequest<'_>,
            ) -> std::result::Result<ModelResponse, ModelError> {
                if self.0.failures.fetch_add(1, Ordering::SeqCst) == 0 {
                    let err = ModelError::Network("connection closed".into());
                    assert!(is_transport_closed(&err));
                    return Err(err);
                }
                Ok(ModelResponse {
                    message: Message::assistant("back online"),
                    usage: Usage::default(),
                })
            }
        }

        let shared = Arc::new(FlakyShared {
            failures: AtomicUsize::new(0),
        });
        let connection = ConnectionManager::new(FlakyConnector(Arc::clone(&shared)));
        let host = MockHost::new();
        let mut session = Session::new("user-1");
        session.seed("hello");

        let text = TurnLoop::new(&connection, &host, session).run().await.unwrap();
        assert_eq!(text, "back online");
        assert_eq!(shared.failures.load(Ordering::SeqCst), 2);
    }
}
