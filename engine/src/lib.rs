//! Agent Desktop Library
//!
//! A desktop agent shell: a language model works through a task by calling a
//! fixed set of local tools (shell, files, directories) under a command
//! safety filter. Used by the `agent-desktop` binary and integration tests.

/// Configuration management module
pub mod config;

/// Command safety filter
pub mod command_safety;

/// Platform-specific behavior module
pub mod platform;

/// Built-in tools, session state and dispatcher
pub mod tools;

/// LLM provider abstraction layer
pub mod llm;

/// Agent loop core module
pub mod agent;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
