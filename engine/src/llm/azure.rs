//! Azure OpenAI chat-completions adapter

use super::{LLMError, LLMProvider, LLMResponse};
use crate::config::Config;
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::{Message, MessageRole, TokenUsage, ToolCall, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AzureOpenAIProvider {
    endpoint: String,
    deployment: String,
    model: String,
    api_version: String,
    api_key: String,
    client: reqwest::Client,
}

impl AzureOpenAIProvider {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        model: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> super::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            model: model.into(),
            api_version: api_version.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build a provider from the `[llm]` section
    ///
    /// # Errors
    ///
    /// `EngineError::NotConfigured` when a required field or the API key is
    /// missing, `EngineError::LLMProvider` if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        config.validate_llm()?;
        let api_key = config
            .llm
            .resolved_api_key()
            .ok_or_else(|| EngineError::NotConfigured("api_key".to_string()))?;

        Self::new(
            &config.llm.endpoint,
            &config.llm.deployment,
            &config.llm.model,
            &config.llm.api_version,
            api_key,
            Duration::from_secs(config.llm.request_timeout_secs),
        )
        .map_err(|e| EngineError::LLMProvider(e.to_string()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: MessageRole,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunctionCall,
}

#[derive(Deserialize)]
struct ResponseFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

fn to_wire_message(msg: &Message) -> WireMessage<'_> {
    WireMessage {
        role: msg.role,
        content: &msg.content,
        tool_calls: msg
            .tool_calls
            .iter()
            .map(|tc| WireToolCall {
                id: &tc.id,
                kind: "function",
                function: WireFunctionCall {
                    name: &tc.name,
                    arguments: &tc.arguments,
                },
            })
            .collect(),
        tool_call_id: msg.tool_call_id.as_deref(),
    }
}

fn to_wire_tool(schema: &ToolSchema) -> WireTool<'_> {
    WireTool {
        kind: "function",
        function: WireFunction {
            name: &schema.name,
            description: &schema.description,
            parameters: schema.to_json_schema(),
        },
    }
}

fn parse_response(body: &str) -> super::Result<LLMResponse> {
    let data: ChatResponse =
        serde_json::from_str(body).map_err(|e| LLMError::ParseError(e.to_string()))?;

    if let Some(error) = data.error {
        return Err(LLMError::InvalidRequest(error.message));
    }

    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
        .collect();

    Ok(LLMResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        usage: data.usage.filter(|u| u.total_tokens > 0),
    })
}

#[async_trait]
impl LLMProvider for AzureOpenAIProvider {
    fn name(&self) -> &str {
        "azure_openai"
    }

    async fn check_health(&self) -> bool {
        !self.api_key.is_empty() && !self.endpoint.is_empty()
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> super::Result<LLMResponse> {
        let payload = ChatRequest {
            messages: messages.iter().map(to_wire_message).collect(),
            tools: tools.iter().map(to_wire_tool).collect(),
        };

        debug!(
            deployment = %self.deployment,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else {
                return Err(LLMError::InvalidRequest(format!(
                    "status {}, body: {}",
                    status.as_u16(),
                    text
                )));
            }
        }

        parse_response(&text)
    }
}
