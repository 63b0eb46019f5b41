//! Model connection lifetime management.
//!
//! The manager establishes the connection lazily, shares one in-flight
//! establishment among concurrent callers, and on a transport-closed failure
//! discards the handle, reconnects, and retries the operation exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::model::{Message, ModelError, ModelRequest, ModelResponse, ToolSpec};

/// Default bound for a single model call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bound for connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Error-text signatures of a severed transport.
const CLOSED_SIGNATURES: &[&str] = &[
    "connection closed",
    "connection reset",
    "broken pipe",
    "transport is closed",
    "channel closed",
    "unexpected eof",
];

/// Whether an error indicates the transport was severed (reconnect-worthy)
/// rather than a tool/validation/provider problem.
pub fn is_transport_closed(err: &ModelError) -> bool {
    let text = err.to_string().to_lowercase();
    CLOSED_SIGNATURES.iter().any(|sig| text.contains(sig))
}

/// A live model connection.
pub trait ModelConnection: Send + Sync {
    fn send(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}

/// Factory for model connections.
pub trait Connector: Send + Sync {
    type Conn: ModelConnection + Send + Sync + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Conn, ModelError>> + Send;
}

/// Owns the shared model connection handle.
///
/// Process-wide shared state: one manager serves all concurrent chat turns.
/// Each operation borrows an `Arc` of the current connection, so a discard
/// during someone else's in-flight call cannot invalidate it.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    conn: Mutex<Option<Arc<C::Conn>>>,
    call_timeout: Duration,
    connect_timeout: Duration,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            conn: Mutex::new(None),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Get the current connection, establishing it if necessary.
    ///
    /// The slot lock is held across `connect`, so concurrent callers await
    /// the same in-flight establishment instead of opening duplicates.
    pub async fn acquire(&self) -> Result<Arc<C::Conn>, ModelError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(Arc::clone(conn));
        }

        debug!("establishing model connection");
        let conn = timeout(self.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| ModelError::Timeout(self.connect_timeout.as_millis() as u64))??;
        let conn = Arc::new(conn);
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Drop the current connection so the next acquire reconnects.
    pub async fn discard(&self) {
        self.conn.lock().await.take();
    }

    /// Send a model request, reconnecting and retrying once if the transport
    /// closed underneath the call.
    pub async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ModelError> {
        let conn = self.acquire().await?;
        let first = match self.bounded_send(&conn, messages, tools).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if !is_transport_closed(&first) {
            return Err(first);
        }

        warn!(error = %first, "model transport closed, reconnecting once");
        self.discard().await;
        let conn = match self.acquire().await {
            Ok(conn) => conn,
            Err(retry) => {
                return Err(ModelError::ReconnectFailed {
                    first: first.to_string(),
                    retry: retry.to_string(),
                });
            }
        };

        self.bounded_send(&conn, messages, tools)
            .await
            .map_err(|retry| ModelError::ReconnectFailed {
                first: first.to_string(),
                retry: retry.to_string(),
            })
    }

    async fn bounded_send(
        &self,
        conn: &C::Conn,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ModelError> {
        timeout(self.call_timeout, conn.send(ModelRequest { messages, tools }))
            .await
            .map_err(|_| ModelError::Timeout(self.call_timeout.as_millis() as u64))?
    }
}
