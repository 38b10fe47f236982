//! Agent Core
//!
//! The orchestration loop. Each iteration makes one model call with the full
//! conversation and the tool schemas, then either runs the requested tools
//! in order and folds their results back into the conversation, or treats a
//! text reply as progress or completion. Every observable event is emitted
//! as a [`Step`] on the run's channel.
//!
//! Two modes share the loop:
//!
//! - **Fresh** (`run_task`): seeds the system prompt and the user's task and
//!   resets the session. A text reply completes the task when it reads like
//!   a sign-off or when too many text replies arrive in a row.
//! - **Continuation** (`continue_conversation`): advances an existing
//!   conversation. A text reply is the assistant's turn and ends the run with
//!   an `assistant_message` step carrying the updated conversation.
//!
//! Only `task_complete` ends a run from inside a tool batch; calls after it
//! in the same batch are not executed.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{LLMProvider, LLMResponse};
use crate::tools::{ToolRegistry, TASK_COMPLETE};
use sdk::errors::EngineError;
use sdk::{Message, ToolSchema};

use super::handle::RunHandle;
use super::prompts::{build_user_message, system_prompt};
use super::step::{Step, StepKind};

/// Default iteration budget per run
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Default number of consecutive text replies before a fresh run completes
pub const DEFAULT_MAX_TEXT_RESPONSES: usize = 2;

/// Capacity of the step channel
const STEP_CHANNEL_CAPACITY: usize = 32;

/// Substrings (lowercase) that make a text reply count as a sign-off
const COMPLETION_PHRASES: &[&str] = &[
    "completed",
    "done",
    "finished",
    "task complete",
    "let me know",
    "anything else",
    "help you with",
];

/// Loop limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentOptions {
    /// Iteration budget; the run fails with an error step once exhausted
    pub max_steps: usize,

    /// Consecutive text-only replies after which a fresh run is complete
    pub max_text_responses: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_text_responses: DEFAULT_MAX_TEXT_RESPONSES,
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_steps: config.max_steps(),
            max_text_responses: config.core.max_text_responses,
        }
    }
}

/// Whether a text reply reads like the model signing off
pub fn looks_complete(content: &str) -> bool {
    let lower = content.to_lowercase();
    COMPLETION_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Fresh,
    Continuation,
}

/// Spawns runs against one provider and one tool registry
#[derive(Clone)]
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    options: AgentOptions,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn LLMProvider>, tools: ToolRegistry) -> Self {
        Self {
            provider,
            tools,
            options: AgentOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> AgentOptions {
        self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Start a fresh run for `task`. Resets the session to the home
    /// directory with empty history before the run begins.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run_task(&self, task: &str, context: Option<&str>) -> RunHandle {
        self.tools.session().reset();

        let messages = vec![
            Message::system(system_prompt(self.tools.platform().as_ref())),
            Message::user(build_user_message(task, context)),
        ];
        self.spawn(messages, Mode::Fresh)
    }

    /// Advance an existing conversation by one assistant turn. The session
    /// is left as it is.
    ///
    /// Must be called from within a tokio runtime.
    pub fn continue_conversation(&self, messages: Vec<Message>) -> RunHandle {
        self.spawn(messages, Mode::Continuation)
    }

    fn spawn(&self, messages: Vec<Message>, mode: Mode) -> RunHandle {
        let (tx, rx) = mpsc::channel(STEP_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let run_id = Uuid::new_v4();

        let run = Run {
            provider: Arc::clone(&self.provider),
            tools: self.tools.clone(),
            options: self.options,
            mode,
            cancel: cancel.clone(),
            tx,
            sequence: 0,
            messages,
            text_responses: 0,
        };

        let span = info_span!("agent_run", run_id = %run_id, mode = ?mode);
        tokio::spawn(run.execute().instrument(span));

        RunHandle::new(run_id, rx, cancel)
    }
}

/// The consumer dropped its receiver
#[derive(Debug)]
struct Disconnected;

enum Flow {
    Continue,
    Stop,
}

/// State of one run, owned by its spawned task
struct Run {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    options: AgentOptions,
    mode: Mode,
    cancel: CancellationToken,
    tx: mpsc::Sender<Step>,
    sequence: usize,
    messages: Vec<Message>,
    text_responses: usize,
}

impl Run {
    async fn execute(mut self) {
        info!(provider = self.provider.name(), "Run started");
        let outcome = self.drive(self.options.max_steps).await;
        match outcome {
            Ok(()) => info!(steps = self.sequence, "Run finished"),
            Err(Disconnected) => debug!("Step receiver dropped, stopping run"),
        }
    }

    async fn drive(&mut self, max_steps: usize) -> Result<(), Disconnected> {
        let schemas = self.tools.definitions();
        let mut step_number = 0;

        while step_number < max_steps {
            step_number += 1;

            if self.cancel.is_cancelled() {
                return self.fail(step_number, EngineError::Cancelled.to_string()).await;
            }

            let response = match self.call_model(schemas).await {
                Some(Ok(response)) => response,
                Some(Err(message)) => return self.fail(step_number, message).await,
                None => {
                    return self.fail(step_number, EngineError::Cancelled.to_string()).await
                }
            };

            if let Some(usage) = response.usage {
                self.emit(step_number, StepKind::Usage { usage }).await?;
            }

            let flow = if response.has_tool_calls() {
                self.handle_tool_calls(step_number, response).await?
            } else {
                self.handle_text(step_number, response.content).await?
            };

            if let Flow::Stop = flow {
                return Ok(());
            }
        }

        // A zero budget still reports its failure as step 1
        let err = EngineError::MaxStepsExceeded(max_steps);
        warn!("{}", err);
        self.fail(step_number.max(1), err.to_string()).await
    }

    /// One model call, raced against cancellation. `None` when cancelled.
    async fn call_model(&self, schemas: &[ToolSchema]) -> Option<Result<LLMResponse, String>> {
        debug!(messages = self.messages.len(), "Calling model");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.provider.complete(&self.messages, schemas) => {
                Some(result.map_err(|e| format!("Error: {}", e)))
            }
        }
    }

    async fn handle_tool_calls(
        &mut self,
        step_number: usize,
        response: LLMResponse,
    ) -> Result<Flow, Disconnected> {
        self.text_responses = 0;

        let LLMResponse {
            content,
            tool_calls,
            ..
        } = response;
        self.messages.push(Message::assistant_with_tool_calls(
            content.clone(),
            tool_calls.clone(),
        ));

        if !content.is_empty() {
            self.emit(step_number, StepKind::Thinking { content }).await?;
        }

        for call in tool_calls {
            let arguments = parse_arguments(&call.name, &call.arguments);
            self.emit(
                step_number,
                StepKind::ToolCall {
                    name: call.name.clone(),
                    arguments: arguments.clone(),
                    content: format!("Calling {}", call.name),
                },
            )
            .await?;

            let result = self.tools.execute(&call.name, &arguments).await;
            self.messages
                .push(Message::tool_result(result.to_message_content(), &call.id));

            let messages = match self.mode {
                Mode::Continuation => Some(self.messages.clone()),
                Mode::Fresh => None,
            };
            self.emit(
                step_number,
                StepKind::ToolResult {
                    name: call.name.clone(),
                    content: result.display_content(),
                    result: result.clone(),
                    messages,
                },
            )
            .await?;

            if call.name == TASK_COMPLETE {
                info!("Task completed by task_complete");
                let messages = Some(self.messages.clone());
                self.emit(
                    step_number,
                    StepKind::Complete {
                        content: result.output,
                        messages,
                    },
                )
                .await?;
                return Ok(Flow::Stop);
            }
        }

        Ok(Flow::Continue)
    }

    async fn handle_text(&mut self, step_number: usize, content: String) -> Result<Flow, Disconnected> {
        if self.mode == Mode::Fresh {
            self.text_responses += 1;
        }

        if content.is_empty() {
            self.fail(step_number, EngineError::EmptyResponse.to_string())
                .await?;
            return Ok(Flow::Stop);
        }

        match self.mode {
            Mode::Continuation => {
                self.messages.push(Message::assistant(content.clone()));
                let messages = self.messages.clone();
                self.emit(step_number, StepKind::AssistantMessage { content, messages })
                    .await?;
                Ok(Flow::Stop)
            }
            Mode::Fresh => {
                let capped = self.text_responses >= self.options.max_text_responses;
                self.messages.push(Message::assistant(content.clone()));

                if looks_complete(&content) || capped {
                    debug!(capped, "Text reply treated as completion");
                    let messages = Some(self.messages.clone());
                    self.emit(step_number, StepKind::Complete { content, messages })
                        .await?;
                    return Ok(Flow::Stop);
                }

                self.emit(step_number, StepKind::Thinking { content }).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Emit a terminal error step carrying the conversation so far
    async fn fail(&mut self, step_number: usize, content: String) -> Result<(), Disconnected> {
        error!(step = step_number, "Run failed: {}", content);
        let messages = Some(self.messages.clone());
        self.emit(step_number, StepKind::Error { content, messages })
            .await
    }

    async fn emit(&mut self, step_number: usize, kind: StepKind) -> Result<(), Disconnected> {
        self.sequence += 1;
        let step = Step {
            step_number,
            sequence: self.sequence,
            kind,
        };
        self.tx.send(step).await.map_err(|_| Disconnected)
    }
}

/// Decode a tool call's argument string. Anything that is not a JSON object
/// becomes an empty map, leaving the dispatcher to report missing fields.
fn parse_arguments(tool: &str, raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Map<String, Value>>(raw) {
        Ok(map) => map,
        Err(e) => {
            if !raw.trim().is_empty() {
                warn!(tool, "Malformed tool arguments: {}", e);
            }
            Map::new()
        }
    }
}
