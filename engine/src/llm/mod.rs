//! LLM Provider Abstraction Layer
//!
//! The orchestration loop talks to a model only through the [`LLMProvider`]
//! trait: one completion call that takes the full conversation plus the tool
//! schemas and returns text, tool calls and optional token usage. One
//! adapter ships with the engine, [`azure::AzureOpenAIProvider`]; tests plug
//! in scripted providers.

use async_trait::async_trait;
use sdk::{Message, TokenUsage, ToolCall, ToolSchema};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod azure;

pub use azure::AzureOpenAIProvider;

/// Timeout for the connection check round trip
pub const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One model completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Free text from the model, possibly empty
    pub content: String,

    /// Tool calls in the order the model listed them
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Token accounting, when the provider reported any
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    /// A text-only response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// A response requesting tool calls
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            usage: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "azure_openai")
    fn name(&self) -> &str;

    /// Run one completion over the whole conversation
    ///
    /// # Arguments
    /// * `messages` - Conversation history including system prompt, user messages and tool results
    /// * `tools` - Tool schemas offered to the model; may be empty
    async fn complete(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<LLMResponse>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Send a minimal "Hi" through `provider` and report whether it answered.
///
/// Returns `(true, "Connected successfully to <endpoint>!")` on success and
/// `(false, "Connection failed: <reason>")` otherwise.
pub async fn check_connection(provider: &dyn LLMProvider, endpoint: &str) -> (bool, String) {
    let messages = [Message::user("Hi")];
    let outcome = tokio::time::timeout(CONNECTION_CHECK_TIMEOUT, provider.complete(&messages, &[]))
        .await
        .unwrap_or(Err(LLMError::Timeout));

    match outcome {
        Ok(_) => {
            tracing::info!(provider = provider.name(), "Connection check succeeded");
            (true, format!("Connected successfully to {}!", endpoint))
        }
        Err(e) => {
            tracing::warn!(provider = provider.name(), "Connection check failed: {}", e);
            (false, format!("Connection failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(std::result::Result<LLMResponse, String>);

    #[async_trait]
    impl LLMProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _: &[Message], _: &[ToolSchema]) -> Result<LLMResponse> {
            self.0.clone().map_err(LLMError::NetworkError)
        }
    }

    #[test]
    fn test_response_constructors() {
        let text = LLMResponse::text("hello");
        assert_eq!(text.content, "hello");
        assert!(!text.has_tool_calls());

        let calls = LLMResponse::with_tool_calls("", vec![ToolCall::new("c1", "read_file", "{}")]);
        assert!(calls.has_tool_calls());
        assert_eq!(calls.usage, None);
    }

    #[tokio::test]
    async fn test_check_connection_success() {
        let provider = FixedProvider(Ok(LLMResponse::text("Hello!")));
        let (ok, message) = check_connection(&provider, "https://example.test").await;
        assert!(ok);
        assert_eq!(message, "Connected successfully to https://example.test!");
    }

    #[tokio::test]
    async fn test_check_connection_failure() {
        let provider = FixedProvider(Err("connection refused".to_string()));
        let (ok, message) = check_connection(&provider, "https://example.test").await;
        assert!(!ok);
        assert_eq!(message, "Connection failed: Network error: connection refused");
    }

    #[tokio::test]
    async fn test_default_health_check() {
        let provider = FixedProvider(Ok(LLMResponse::default()));
        assert!(provider.check_health().await);
    }
}
