//! Tool host boundary.

mod errors;
mod r#trait;

pub use errors::ToolError;
pub use r#trait::ToolHost;
