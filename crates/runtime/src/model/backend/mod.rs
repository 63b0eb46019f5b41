//! Model provider backends.

mod gemini;

pub use gemini::{GeminiBackend, GeminiConnector};
