//! Long-lived helpers that act on incoming messages.

/// Time-boxed auto-reply tasks.
pub mod auto_reply;

pub use auto_reply::{AutoReplyAgent, AutoReplyTask, DEFAULT_TASK_DURATION};
