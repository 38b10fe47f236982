//! Error types and handling
//!
//! This module provides the error types shared by the Agent Desktop engine and
//! its hosts. All errors implement the `AgentErrorExt` trait which provides
//! user-friendly hints.
//!
//! Tool failures are deliberately absent from this taxonomy: a failing tool
//! produces a `ToolResult` with `success = false` that is fed back to the
//! model, it never surfaces as an `EngineError`.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Hosts use the hint when rendering a failed run or a setup problem.
pub trait AgentErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and never contains API keys
    /// or endpoint details.
    fn user_hint(&self) -> &str;
}

/// Main engine error type
///
/// Covers every condition that ends a run or prevents one from starting.
///
/// # Examples
///
/// ```
/// use sdk::errors::{AgentErrorExt, EngineError};
///
/// let error = EngineError::MaxStepsExceeded(20);
/// assert!(error.to_string().contains("20"));
///
/// let setup = EngineError::NotConfigured("endpoint".to_string());
/// assert!(setup.user_hint().contains("endpoint"));
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM not configured: {0} is required")]
    NotConfigured(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Received empty response from model")]
    EmptyResponse,

    // Run lifecycle errors
    #[error("Task cancelled")]
    Cancelled,

    #[error("Maximum steps reached ({0}) without completing the task")]
    MaxStepsExceeded(usize),
}

impl AgentErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::NotConfigured(_) => "Set the Azure OpenAI endpoint, deployment, model and key",

            Self::LLMProvider(_) => "LLM provider unavailable. Check your API key and network",
            Self::EmptyResponse => "The model returned nothing. Try rephrasing the task",

            Self::Cancelled => "The task was stopped before it finished",
            Self::MaxStepsExceeded(_) => "Task too complex. Try breaking it into smaller steps",
        }
    }
}
