//! Agent Desktop SDK
//!
//! Shared data contract between the engine, model-provider adapters and host
//! applications: conversation messages, tool schemas and results, and the
//! engine error taxonomy.

/// Error types and handling
pub mod errors;

/// Conversation message types
pub mod message;

/// Tool schema and result types
pub mod types;

// Re-export commonly used types
pub use errors::{AgentErrorExt, EngineError};
pub use message::{Message, MessageRole, TokenUsage, ToolCall};
pub use types::{ParamType, ToolParameter, ToolResult, ToolSchema};
