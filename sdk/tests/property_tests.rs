use proptest::prelude::*;
use sdk::errors::{AgentErrorExt, EngineError};
use sdk::types::ToolResult;

// Every error variant must offer a non-empty, static hint that never echoes
// the raw payload back to the user.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "[a-z]{12,40}") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::NotConfigured(error_str.clone()),
            EngineError::LLMProvider(error_str.clone()),
            EngineError::EmptyResponse,
            EngineError::Cancelled,
            EngineError::MaxStepsExceeded(error_str.len()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }
    }
}

// The message fed back to the model always contains both the captured output
// and the error text, so the model can react to a failure.
proptest! {
    #[test]
    fn test_tool_result_message_keeps_output_and_error(
        output in "\\PC{0,64}",
        error in "\\PC{1,64}",
    ) {
        let result = ToolResult::failed_with_output(output.clone(), error.clone());
        let content = result.to_message_content();
        prop_assert!(content.starts_with(&output));
        prop_assert!(content.ends_with(&error));
        prop_assert!(!result.success);
    }
}
