//! Tool call tracking
//!
//! Remote tool executions are reported over the event stream; this module
//! keeps their running/completed lifecycle for callbacks and statistics.

pub mod registry;
pub mod types;

pub use registry::{ToolCallRegistry, ToolUpsert};
pub use types::{ToolCall, ToolStatus};
