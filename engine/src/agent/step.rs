//! Observable steps emitted by a run
//!
//! A run streams `Step`s one at a time. `step_number` is the loop iteration
//! that produced the step (several steps share one iteration); `sequence`
//! numbers the emissions themselves, starting at 1 and strictly increasing
//! within a run. Steps are never revised once sent.

use sdk::{Message, TokenUsage, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_number: usize,
    pub sequence: usize,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// What happened, tagged as `type` in the serialized form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Model text that is neither a tool call nor a final answer
    Thinking { content: String },

    /// A tool is about to run
    ToolCall {
        name: String,
        arguments: Map<String, Value>,
        content: String,
    },

    /// A tool finished. `messages` is set in continuation runs so hosts can
    /// persist the conversation as it grows.
    ToolResult {
        name: String,
        result: ToolResult,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        messages: Option<Vec<Message>>,
    },

    /// Conversational reply that ends a continuation run
    AssistantMessage {
        content: String,
        messages: Vec<Message>,
    },

    /// The task is finished
    Complete {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        messages: Option<Vec<Message>>,
    },

    /// The run failed or was cancelled
    Error {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        messages: Option<Vec<Message>>,
    },

    /// Token accounting for the model call of this iteration
    Usage { usage: TokenUsage },
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::AssistantMessage { .. } => "assistant_message",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::Usage { .. } => "usage",
        }
    }
}

impl Step {
    /// Whether this step ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            StepKind::Complete { .. } | StepKind::Error { .. } | StepKind::AssistantMessage { .. }
        )
    }

    /// Display text; empty for usage steps
    pub fn content(&self) -> &str {
        match &self.kind {
            StepKind::Thinking { content }
            | StepKind::ToolCall { content, .. }
            | StepKind::ToolResult { content, .. }
            | StepKind::AssistantMessage { content, .. }
            | StepKind::Complete { content, .. }
            | StepKind::Error { content, .. } => content,
            StepKind::Usage { .. } => "",
        }
    }

    /// Conversation snapshot carried by the step, if any
    pub fn messages(&self) -> Option<&[Message]> {
        match &self.kind {
            StepKind::AssistantMessage { messages, .. } => Some(messages),
            StepKind::ToolResult { messages, .. }
            | StepKind::Complete { messages, .. }
            | StepKind::Error { messages, .. } => messages.as_deref(),
            _ => None,
        }
    }
}
