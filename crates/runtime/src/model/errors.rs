use thiserror::Error;

/// Errors from model transport and provider calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The model provider returned an error response.
    #[error("provider api: {0}")]
    Api(String),

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The call did not complete within the configured bound.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// The transport closed and the single reconnect-and-retry also failed.
    #[error("transport closed and retry failed: first: {first}; retry: {retry}")]
    ReconnectFailed { first: String, retry: String },
}
