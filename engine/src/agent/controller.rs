//! Run Controller
//!
//! Hosts drive one session at a time. Starting a run through the controller
//! cancels whatever run it started before, so two runs never mutate the
//! same session concurrently from the host's point of view.

use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::core::AgentLoop;
use super::handle::RunHandle;
use sdk::Message;

pub struct RunController {
    agent: AgentLoop,
    active: Mutex<Option<CancellationToken>>,
}

impl RunController {
    pub fn new(agent: AgentLoop) -> Self {
        Self {
            agent,
            active: Mutex::new(None),
        }
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Cancel the previous run, then start a fresh one
    pub fn run_task(&self, task: &str, context: Option<&str>) -> RunHandle {
        self.cancel_active();
        let handle = self.agent.run_task(task, context);
        self.track(&handle);
        handle
    }

    /// Cancel the previous run, then continue `messages`
    pub fn continue_conversation(&self, messages: Vec<Message>) -> RunHandle {
        self.cancel_active();
        let handle = self.agent.continue_conversation(messages);
        self.track(&handle);
        handle
    }

    /// Cancel the run started most recently. Returns `true` if one was still
    /// marked active.
    pub fn cancel_active(&self) -> bool {
        let previous = self.active.lock().expect("Run controller lock poisoned").take();
        match previous {
            Some(token) if !token.is_cancelled() => {
                info!("Cancelling in-flight run");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    fn track(&self, handle: &RunHandle) {
        *self.active.lock().expect("Run controller lock poisoned") =
            Some(handle.cancellation_token());
    }
}
