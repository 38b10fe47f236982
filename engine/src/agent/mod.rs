//! Agent Loop
//!
//! The orchestration loop that drives model calls and tool execution, the
//! steps it emits, the handle hosts read them from, and the controller that
//! keeps one run active per session.

pub mod controller;
pub mod core;
pub mod handle;
pub mod prompts;
pub mod step;

pub use controller::RunController;
pub use core::{looks_complete, AgentLoop, AgentOptions};
pub use handle::RunHandle;
pub use step::{Step, StepKind};
