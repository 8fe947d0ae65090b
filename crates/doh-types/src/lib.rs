pub mod message;

pub use message::{ChatMessage, FunctionCall, ToolCall};
