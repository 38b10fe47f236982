//! Integration tests for the agent loop and run controller
//!
//! A scripted provider stands in for the model: it replays queued responses
//! and records every conversation it was sent.

use agent_desktop::agent::{AgentLoop, AgentOptions, RunController, Step, StepKind};
use agent_desktop::llm::{LLMError, LLMProvider, LLMResponse, Result as LLMResult};
use agent_desktop::platform::{Platform, UnixPlatform};
use agent_desktop::tools::{Session, ToolRegistry};
use async_trait::async_trait;
use futures::StreamExt;
use sdk::{Message, MessageRole, TokenUsage, ToolCall, ToolSchema};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Conversations containing this marker never get an answer
const HANG: &str = "[hang]";

struct ScriptedProvider {
    replies: Mutex<VecDeque<LLMResponse>>,
    received: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<LLMResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            received: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    fn conversation(&self, call: usize) -> Vec<Message> {
        self.received.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[Message], _tools: &[ToolSchema]) -> LLMResult<LLMResponse> {
        self.received.lock().unwrap().push(messages.to_vec());
        if messages.iter().any(|m| m.content.contains(HANG)) {
            std::future::pending::<()>().await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.ok_or_else(|| LLMError::ProviderUnavailable("script exhausted".to_string()))
    }
}

struct Harness {
    temp: TempDir,
    session: Arc<Session>,
    provider: Arc<ScriptedProvider>,
    agent: AgentLoop,
}

fn harness(replies: Vec<LLMResponse>) -> Harness {
    let temp = TempDir::new().unwrap();
    let session = Arc::new(Session::new(temp.path()));
    let platform: Arc<dyn Platform> = Arc::new(UnixPlatform::linux(temp.path()));
    let tools = ToolRegistry::with_platform(Arc::clone(&session), platform);
    let provider = ScriptedProvider::new(replies);
    let agent = AgentLoop::new(provider.clone(), tools);
    Harness {
        temp,
        session,
        provider,
        agent,
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

fn kinds(steps: &[Step]) -> Vec<&'static str> {
    steps.iter().map(|s| s.kind.name()).collect()
}

fn assert_sequence(steps: &[Step]) {
    for (i, step) in steps.iter().enumerate() {
        assert_eq!(step.sequence, i + 1, "sequence gap at {:?}", step);
    }
    let last = steps.last().expect("run emitted no steps");
    assert!(last.is_terminal());
    assert_eq!(steps.iter().filter(|s| s.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_write_then_task_complete() {
    let h = harness(vec![
        LLMResponse::with_tool_calls(
            "I'll create the file.",
            vec![call("call_1", "write_file", json!({"path": "hello.txt", "content": "hi"}))],
        ),
        LLMResponse::with_tool_calls(
            "",
            vec![
                call(
                    "call_2",
                    "task_complete",
                    json!({"summary": "Created hello.txt", "files_modified": ["hello.txt"]}),
                ),
                call("call_3", "delete_file", json!({"path": "hello.txt", "confirm": true})),
            ],
        ),
        LLMResponse::text("never requested"),
    ]);

    let steps = h.agent.run_task("Create hello.txt", None).collect().await;
    assert_sequence(&steps);
    assert_eq!(
        kinds(&steps),
        vec!["thinking", "tool_call", "tool_result", "tool_call", "tool_result", "complete"]
    );
    assert_eq!(
        steps.iter().map(|s| s.step_number).collect::<Vec<_>>(),
        vec![1, 1, 1, 2, 2, 2]
    );

    // Calls after task_complete in the same batch are skipped
    assert_eq!(std::fs::read_to_string(h.temp.path().join("hello.txt")).unwrap(), "hi");
    assert_eq!(h.provider.calls(), 2);

    match &steps[1].kind {
        StepKind::ToolCall { name, arguments, content } => {
            assert_eq!(name, "write_file");
            assert_eq!(arguments["path"], "hello.txt");
            assert_eq!(content, "Calling write_file");
        }
        other => panic!("unexpected {:?}", other),
    }
    match &steps[2].kind {
        StepKind::ToolResult { result, messages, .. } => {
            assert!(result.success);
            assert!(messages.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }

    let complete = steps.last().unwrap();
    assert!(complete.content().starts_with("✅ Task completed!"));
    assert!(complete.content().contains("Created hello.txt"));
    let messages = complete.messages().unwrap();
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[1].content, "Create hello.txt");
}

#[tokio::test]
async fn test_tool_results_answer_their_calls() {
    let h = harness(vec![
        LLMResponse::with_tool_calls(
            "",
            vec![
                call("a", "get_current_directory", json!({})),
                call("b", "list_directory", json!({})),
            ],
        ),
        LLMResponse::text("All done."),
    ]);

    let steps = h.agent.run_task("Where am I?", None).collect().await;
    assert_eq!(steps.last().unwrap().kind.name(), "complete");

    let second = h.provider.conversation(1);
    assert_eq!(second.len(), 5);
    assert_eq!(second[2].role, MessageRole::Assistant);
    assert_eq!(second[2].tool_calls.len(), 2);
    assert_eq!(second[3].role, MessageRole::Tool);
    assert_eq!(second[3].tool_call_id.as_deref(), Some("a"));
    assert_eq!(second[3].content, h.temp.path().display().to_string());
    assert_eq!(second[4].tool_call_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_completion_phrase_ends_run() {
    let h = harness(vec![LLMResponse::text("I've finished organising your notes.")]);

    let steps = h.agent.run_task("Organise notes", None).collect().await;
    assert_eq!(kinds(&steps), vec!["complete"]);
    assert_eq!(steps[0].content(), "I've finished organising your notes.");

    let messages = steps[0].messages().unwrap();
    assert_eq!(messages.last().unwrap().role, MessageRole::Assistant);
}

#[tokio::test]
async fn test_text_reply_cap() {
    let h = harness(vec![
        LLMResponse::text("Let me think about this."),
        LLMResponse::text("Still thinking."),
        LLMResponse::text("never requested"),
    ]);

    let steps = h.agent.run_task("Ponder", None).collect().await;
    assert_eq!(kinds(&steps), vec!["thinking", "complete"]);
    assert_eq!(steps[1].content(), "Still thinking.");
    assert_eq!(steps[1].step_number, 2);
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn test_tool_call_resets_text_counter() {
    let h = harness(vec![
        LLMResponse::text("Let me look."),
        LLMResponse::with_tool_calls("", vec![call("c1", "get_current_directory", json!({}))]),
        LLMResponse::text("Checking more."),
        LLMResponse::text("Almost there."),
    ]);

    let steps = h.agent.run_task("Look around", None).collect().await;
    assert_sequence(&steps);
    assert_eq!(
        kinds(&steps),
        vec!["thinking", "tool_call", "tool_result", "thinking", "complete"]
    );
    assert_eq!(steps.last().unwrap().step_number, 4);
}

#[tokio::test]
async fn test_empty_response_is_an_error() {
    let h = harness(vec![LLMResponse::text("")]);

    let steps = h.agent.run_task("Say something", None).collect().await;
    assert_eq!(kinds(&steps), vec!["error"]);
    assert_eq!(steps[0].content(), "Received empty response from model");
    assert_eq!(steps[0].messages().unwrap().len(), 2);
}

#[tokio::test]
async fn test_provider_error_is_reported() {
    let h = harness(Vec::new());

    let steps = h.agent.run_task("Anything", None).collect().await;
    assert_eq!(kinds(&steps), vec!["error"]);
    assert_eq!(
        steps[0].content(),
        "Error: Provider unavailable: script exhausted"
    );
}

#[tokio::test]
async fn test_max_steps_exceeded() {
    let looping: Vec<LLMResponse> = (0..5)
        .map(|i| {
            LLMResponse::with_tool_calls(
                "",
                vec![call(&format!("c{}", i), "get_current_directory", json!({}))],
            )
        })
        .collect();
    let h = harness(looping);
    let agent = h.agent.clone().with_options(AgentOptions {
        max_steps: 3,
        max_text_responses: 2,
    });

    let steps = agent.run_task("Loop forever", None).collect().await;
    assert_sequence(&steps);
    let last = steps.last().unwrap();
    assert_eq!(last.kind.name(), "error");
    assert_eq!(last.step_number, 3);
    assert!(last.content().contains("(3)"));
    assert_eq!(h.provider.calls(), 3);
}

#[tokio::test]
async fn test_usage_is_reported_first() {
    let mut response = LLMResponse::text("Done.");
    response.usage = Some(TokenUsage {
        prompt_tokens: 12,
        completion_tokens: 3,
        total_tokens: 15,
    });
    let h = harness(vec![response]);

    let steps = h.agent.run_task("Quick task", None).collect().await;
    assert_eq!(kinds(&steps), vec!["usage", "complete"]);
    match &steps[0].kind {
        StepKind::Usage { usage } => assert_eq!(usage.total_tokens, 15),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_arguments_reach_the_tool_as_empty() {
    let h = harness(vec![
        LLMResponse::with_tool_calls("", vec![ToolCall::new("c1", "read_file", "{not json")]),
        LLMResponse::text("All done."),
    ]);

    let steps = h.agent.run_task("Read it", None).collect().await;
    match &steps[1].kind {
        StepKind::ToolResult { result, .. } => {
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().contains("path"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(steps.last().unwrap().kind.name(), "complete");
}

#[tokio::test]
async fn test_task_complete_as_first_reply() {
    let h = harness(vec![LLMResponse::with_tool_calls(
        "",
        vec![call("c1", "task_complete", json!({"summary": "Nothing to do"}))],
    )]);

    let steps = h.agent.run_task("Check the desktop", None).collect().await;
    assert_sequence(&steps);
    assert_eq!(kinds(&steps), vec!["tool_call", "tool_result", "complete"]);
    assert!(steps.iter().all(|s| s.kind.name() != "error"));

    let tool_calls: Vec<&Step> = steps.iter().filter(|s| s.kind.name() == "tool_call").collect();
    assert_eq!(tool_calls.len(), 1);
    match &tool_calls[0].kind {
        StepKind::ToolCall { name, .. } => assert_eq!(name, "task_complete"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(steps[2].content().contains("Nothing to do"));
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_completion_text_is_the_only_step() {
    let h = harness(vec![LLMResponse::text("I have completed the task")]);

    let steps = h.agent.run_task("Tidy up", None).collect().await;
    assert_eq!(kinds(&steps), vec!["complete"]);
    assert_eq!(steps[0].content(), "I have completed the task");
    assert_eq!(steps[0].step_number, 1);
}

#[tokio::test]
async fn test_continuation_sign_off_is_not_complete() {
    let h = harness(vec![LLMResponse::text(
        "Sorted. Let me know if you need anything else.",
    )]);

    let conversation = vec![Message::user("Sort my downloads")];
    let steps = h.agent.continue_conversation(conversation).collect().await;
    assert_eq!(kinds(&steps), vec!["assistant_message"]);
    assert_eq!(
        steps.iter().filter(|s| s.kind.name() == "assistant_message").count(),
        1
    );
    assert!(steps.iter().all(|s| s.kind.name() != "complete"));
}

#[tokio::test]
async fn test_unknown_tool_does_not_stop_the_run() {
    let h = harness(vec![
        LLMResponse::with_tool_calls("", vec![call("c1", "launch_rockets", json!({}))]),
        LLMResponse::text("All done."),
    ]);

    let steps = h.agent.run_task("Launch", None).collect().await;
    assert_sequence(&steps);
    assert_eq!(kinds(&steps), vec!["tool_call", "tool_result", "complete"]);
    match &steps[1].kind {
        StepKind::ToolResult { result, .. } => {
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some("Unknown tool: launch_rockets"));
        }
        other => panic!("unexpected {:?}", other),
    }

    let second = h.provider.conversation(1);
    assert_eq!(second[3].role, MessageRole::Tool);
    assert!(second[3].content.contains("Error: Unknown tool: launch_rockets"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_blocked_command_is_fed_back_to_the_model() {
    let h = harness(vec![
        LLMResponse::with_tool_calls(
            "",
            vec![call("c1", "run_command", json!({"command": "rm -rf /"}))],
        ),
        LLMResponse::text("That command is not allowed, so I stopped. Done."),
    ]);

    let steps = h.agent.run_task("Free up disk space", None).collect().await;
    assert_sequence(&steps);
    assert_eq!(kinds(&steps), vec!["tool_call", "tool_result", "complete"]);
    match &steps[1].kind {
        StepKind::ToolResult { result, .. } => {
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().starts_with("Command blocked:"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(h.session.history().is_empty());

    assert_eq!(h.provider.calls(), 2);
    let second = h.provider.conversation(1);
    assert_eq!(second[3].tool_call_id.as_deref(), Some("c1"));
    assert!(second[3].content.contains("Error: Command blocked:"));
}

#[tokio::test]
async fn test_zero_step_budget_never_calls_the_model() {
    let h = harness(vec![LLMResponse::text("never requested")]);
    let agent = h.agent.clone().with_options(AgentOptions {
        max_steps: 0,
        max_text_responses: 2,
    });

    let steps = agent.run_task("Anything", None).collect().await;
    assert_eq!(kinds(&steps), vec!["error"]);
    assert!(steps[0].content().contains("(0)"));
    assert_eq!(steps[0].step_number, 1);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_fresh_run_resets_session() {
    let h = harness(vec![LLMResponse::text("Done.")]);
    std::fs::create_dir(h.temp.path().join("elsewhere")).unwrap();
    let cd = h
        .agent
        .tools()
        .execute("change_directory", json!({"path": "elsewhere"}).as_object().unwrap())
        .await;
    assert!(cd.success);
    h.session.record("ls", 0);

    h.agent.run_task("Reset me", None).collect().await;
    assert_eq!(h.session.cwd(), h.temp.path());
    assert!(h.session.history().is_empty());
}

#[tokio::test]
async fn test_continuation_returns_assistant_message() {
    let h = harness(vec![LLMResponse::text("Hello there")]);
    std::fs::create_dir(h.temp.path().join("kept")).unwrap();
    h.agent
        .tools()
        .execute("change_directory", json!({"path": "kept"}).as_object().unwrap())
        .await;

    let conversation = vec![Message::system("You help."), Message::user("Hi")];
    let steps = h
        .agent
        .continue_conversation(conversation)
        .collect()
        .await;

    assert_eq!(kinds(&steps), vec!["assistant_message"]);
    let messages = steps[0].messages().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2], Message::assistant("Hello there"));
    // Continuation leaves the session alone
    assert_eq!(h.session.cwd(), h.temp.path().join("kept"));
}

#[tokio::test]
async fn test_continuation_tool_results_carry_messages() {
    let h = harness(vec![
        LLMResponse::with_tool_calls("", vec![call("c1", "get_current_directory", json!({}))]),
        LLMResponse::text("You are in the temp dir. Done."),
    ]);

    let conversation = vec![Message::user("Where am I?")];
    let steps = h.agent.continue_conversation(conversation).collect().await;
    assert_eq!(kinds(&steps), vec!["tool_call", "tool_result", "assistant_message"]);

    let snapshot = steps[1].messages().unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[2].role, MessageRole::Tool);
    assert_eq!(steps[2].messages().unwrap().len(), 4);
}

#[tokio::test]
async fn test_cancel_before_first_call() {
    let h = harness(vec![LLMResponse::text("never requested")]);

    let handle = h.agent.run_task("Cancel me", None);
    handle.cancel();
    assert!(handle.is_cancelled());

    let steps = handle.collect().await;
    assert_eq!(kinds(&steps), vec!["error"]);
    assert_eq!(steps[0].content(), "Task cancelled");
    assert_eq!(steps[0].step_number, 1);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_model_call() {
    let h = harness(Vec::new());

    let handle = h.agent.run_task(&format!("Slow task {}", HANG), None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.provider.calls(), 1);
    handle.cancel();

    let steps = tokio::time::timeout(Duration::from_secs(5), handle.collect())
        .await
        .expect("cancelled run did not finish");
    assert_eq!(kinds(&steps), vec!["error"]);
    assert_eq!(steps[0].content(), "Task cancelled");
    assert_eq!(steps[0].messages().unwrap().len(), 2);
}

#[tokio::test]
async fn test_controller_cancels_previous_run() {
    let h = harness(vec![LLMResponse::text("All done.")]);
    let controller = RunController::new(h.agent.clone());

    let first = controller.run_task(&format!("First {}", HANG), None);
    let second = controller.run_task("Second", None);
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());

    let first_steps = tokio::time::timeout(Duration::from_secs(5), first.collect())
        .await
        .expect("first run did not stop");
    assert_eq!(first_steps.last().unwrap().content(), "Task cancelled");

    let second_steps = second.collect().await;
    assert_eq!(kinds(&second_steps), vec!["complete"]);
}

#[tokio::test]
async fn test_controller_cancel_active() {
    let h = harness(Vec::new());
    let controller = RunController::new(h.agent.clone());
    assert!(!controller.cancel_active());

    let handle = controller.run_task(&format!("Wait {}", HANG), None);
    assert!(controller.cancel_active());
    assert!(handle.is_cancelled());

    let steps = handle.collect().await;
    assert_eq!(steps.last().unwrap().content(), "Task cancelled");
}

#[tokio::test]
async fn test_into_stream() {
    let h = harness(vec![
        LLMResponse::with_tool_calls("", vec![call("c1", "get_current_directory", json!({}))]),
        LLMResponse::text("Done."),
    ]);

    let handle = h.agent.run_task("Stream it", None);
    let id = handle.id();
    assert!(!id.is_nil());

    let steps: Vec<Step> = handle.into_stream().collect().await;
    assert_sequence(&steps);
    assert_eq!(kinds(&steps), vec!["tool_call", "tool_result", "complete"]);
}
