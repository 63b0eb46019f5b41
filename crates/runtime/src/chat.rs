//! Chat-turn request/response boundary.
//!
//! The UI layer hands a validated request here and gets exactly one
//! structured success/failure response back; partial progress is never
//! surfaced.

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::connection::{ConnectionManager, Connector};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::tools::ToolHost;
use crate::turn::{TurnLoop, TurnOptions};

/// One chat turn from the UI layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(alias = "userId")]
    pub user_id: String,
}

/// The single structured response per chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    status: u16,
}

impl ChatResponse {
    fn ok(text: String) -> Self {
        Self {
            success: true,
            text: Some(text),
            error: None,
            status: 200,
        }
    }

    fn failure(status: u16, error: String) -> Self {
        Self {
            success: false,
            text: None,
            error: Some(error),
            status,
        }
    }

    /// HTTP-style status: 400 for validation failures, 500 otherwise.
    pub fn status(&self) -> u16 {
        self.status
    }
}

fn validate(request: &ChatRequest) -> Result<()> {
    if request.message.trim().is_empty() {
        return Err(Error::Validation("message is required".into()));
    }
    if request.user_id.trim().is_empty() {
        return Err(Error::Validation("user_id is required".into()));
    }
    Ok(())
}

/// Run one chat turn end to end.
pub async fn handle_chat<C: Connector, H: ToolHost>(
    connection: &ConnectionManager<C>,
    tools: &H,
    request: ChatRequest,
    options: TurnOptions,
) -> ChatResponse {
    if let Err(err) = validate(&request) {
        return ChatResponse::failure(err.status(), err.to_string());
    }

    let mut session = Session::new(&request.user_id);
    if let Some(product_id) = &request.product_id {
        session = session.with_product(product_id);
    }
    session.seed(&request.message);

    let span = tracing::info_span!(
        "chat_turn",
        turn = %session.id(),
        user = %request.user_id,
        product = request.product_id.as_deref().unwrap_or("-"),
    );
    let outcome = TurnLoop::new(connection, tools, session)
        .with_options(options)
        .run()
        .instrument(span)
        .await;

    match outcome {
        Ok(text) => ChatResponse::ok(text),
        Err(err) => ChatResponse::failure(err.status(), err.to_string()),
    }
}
