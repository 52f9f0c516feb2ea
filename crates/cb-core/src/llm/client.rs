//! LLM API HTTP Client
//!
//! Supports both Claude API and OpenAI-compatible APIs (GLM, Gemini, etc.)

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, Result};
use crate::tool::ToolManager;

use super::types::*;

/// Anything that answers a Messages API request.
///
/// The HTTP client implements it; tests substitute scripted models.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one request and return the model's reply
    async fn messages(&self, request: MessagesRequest) -> Result<MessagesResponse>;

    /// Model name placed into requests
    fn model(&self) -> &str;
}

/// LLM API client (supports Claude and OpenAI-compatible APIs)
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: LlmProvider,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(Error::Config("LLM API key is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        let base_url = match &config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => match config.provider {
                LlmProvider::Claude => "https://api.anthropic.com/v1".to_string(),
                LlmProvider::OpenAi => "https://api.openai.com/v1".to_string(),
            },
        };

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url,
            provider: config.provider.clone(),
        })
    }

    /// Create with custom base URL (for testing or custom endpoints)
    pub fn with_base_url(config: &LlmConfig, base_url: impl Into<String>) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(client)
    }

    /// Get the provider type
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Send request to Claude API
    async fn send_claude_request(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!("Sending request to Claude API: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("Claude API error: {} - {}", status, body);
            return Err(Error::LlmApi(format!("{}: {}", status, body)));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            Error::LlmApi(format!("Failed to parse response: {} - {}", e, body))
        })?;

        info!(
            "Claude API response: stop_reason={}, tokens={}",
            parsed.stop_reason,
            parsed.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0)
        );

        Ok(parsed)
    }

    /// Send request to OpenAI-compatible API
    async fn send_openai_request(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!("Sending request to OpenAI-compatible API: {}", url);

        let openai_request = ChatCompletionRequest::from_messages_request(&request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("OpenAI API error: {} - {}", status, body);
            return Err(Error::LlmApi(format!("{}: {}", status, body)));
        }

        let openai_response: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::LlmApi(format!("Failed to parse response: {} - {}", e, body))
        })?;

        let parsed = openai_response.to_messages_response();

        info!(
            "OpenAI API response: stop_reason={}, tokens={}",
            parsed.stop_reason,
            parsed.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0)
        );

        Ok(parsed)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn messages(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        match self.provider {
            LlmProvider::Claude => self.send_claude_request(request).await,
            LlmProvider::OpenAi => self.send_openai_request(request).await,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Result of agent loop execution
#[derive(Debug)]
pub struct AgentLoopResult {
    pub final_response: String,
    pub iterations: usize,
    pub total_tokens: TokenUsage,
    pub tool_calls: Vec<ToolCall>,
    /// The loop stopped because `max_iterations` was exceeded
    pub hit_iteration_limit: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub is_error: bool,
}

/// Run the function-calling loop for one user turn.
///
/// `messages` must end with the user's turn. Tool exchanges and the final
/// assistant reply are appended to it, so the caller's history stays valid
/// for the next turn.
pub async fn run_agent_loop<M: ChatModel + ?Sized>(
    model: &M,
    messages: &mut Vec<Message>,
    system: Option<&str>,
    tools: &ToolManager,
    max_iterations: usize,
) -> Result<AgentLoopResult> {
    let mut iterations = 0;
    let mut total_tokens = TokenUsage::default();
    let mut tool_calls = Vec::new();
    let definitions = tools.definitions();

    loop {
        iterations += 1;
        if iterations > max_iterations {
            warn!("Agent loop stopped after {} iterations", max_iterations);
            return Ok(AgentLoopResult {
                final_response: String::new(),
                iterations: max_iterations,
                total_tokens,
                tool_calls,
                hit_iteration_limit: true,
            });
        }

        let request = MessagesRequest {
            model: model.model().to_string(),
            max_tokens: 4096,
            system: system.map(str::to_string),
            messages: messages.clone(),
            tools: if definitions.is_empty() {
                None
            } else {
                Some(definitions.clone())
            },
        };

        let response = model.messages(request).await?;

        if let Some(usage) = &response.usage {
            total_tokens.input_tokens += usage.input_tokens;
            total_tokens.output_tokens += usage.output_tokens;
        }

        match response.stop_reason.as_str() {
            "end_turn" | "stop_sequence" | "stop" | "max_tokens" => {
                let text = response.text();
                messages.push(Message::assistant(&text));

                return Ok(AgentLoopResult {
                    final_response: text,
                    iterations,
                    total_tokens,
                    tool_calls,
                    hit_iteration_limit: false,
                });
            }
            "tool_use" | "tool_calls" => {
                let tool_uses = response.tool_uses();

                if tool_uses.is_empty() {
                    warn!("tool_use stop_reason but no tool_uses found");
                    continue;
                }

                messages.push(Message {
                    role: "assistant".to_string(),
                    content: response.content.clone(),
                });

                let mut tool_results = Vec::new();
                for (id, name, input) in tool_uses {
                    debug!("Executing tool: {} with input: {}", name, input);
                    let result = tools.execute(&name, input.clone()).await;
                    tool_results.push(MessageContent::ToolResult {
                        tool_use_id: id.clone(),
                        content: result.output,
                        is_error: result.is_error,
                    });
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        input,
                        is_error: result.is_error,
                    });
                }

                messages.push(Message {
                    role: "user".to_string(),
                    content: tool_results,
                });
            }
            other => {
                warn!("Unknown stop_reason: {}", other);
                return Err(Error::LlmApi(format!("Unknown stop_reason: {}", other)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolResult};
    use serde_json::{json, Value as JsonValue};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct ScriptedModel {
        replies: Mutex<VecDeque<MessagesResponse>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<MessagesResponse>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn messages(&self, _request: MessagesRequest) -> Result<MessagesResponse> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::LlmApi("script exhausted".to_string()))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn input_schema(&self) -> JsonValue {
            json!({"type": "object"})
        }

        async fn execute(&self, input: JsonValue) -> Result<ToolResult> {
            Ok(ToolResult::success(input.to_string()))
        }
    }

    fn reply(stop_reason: &str, content: Vec<MessageContent>) -> MessagesResponse {
        MessagesResponse {
            id: "msg".to_string(),
            content,
            model: "scripted".to_string(),
            stop_reason: stop_reason.to_string(),
            usage: Some(Usage {
                input_tokens: 1,
                output_tokens: 1,
            }),
        }
    }

    fn llm_config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            provider,
            ..Default::default()
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = LlmClient::new(&LlmConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_agent_loop_runs_tools_then_answers() {
        let model = ScriptedModel::new(vec![
            reply(
                "tool_use",
                vec![MessageContent::ToolUse {
                    id: "t1".to_string(),
                    name: "echo".to_string(),
                    input: json!({"x": 1}),
                }],
            ),
            reply("end_turn", vec![MessageContent::Text { text: "done".to_string() }]),
        ]);
        let mut tools = ToolManager::new();
        tools.register(Arc::new(EchoTool));

        let mut messages = vec![Message::user("go")];
        let result = run_agent_loop(&model, &mut messages, Some("sys"), &tools, 5)
            .await
            .unwrap();

        assert_eq!(result.final_response, "done");
        assert_eq!(result.iterations, 2);
        assert_eq!(result.total_tokens.output_tokens, 2);
        assert_eq!(result.tool_calls.len(), 1);
        assert!(!result.tool_calls[0].is_error);
        // user, assistant tool_use, user tool_result, assistant text
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].text_content(), "done");
    }

    #[tokio::test]
    async fn test_agent_loop_unknown_tool_is_reported_to_model() {
        let model = ScriptedModel::new(vec![
            reply(
                "tool_use",
                vec![MessageContent::ToolUse {
                    id: "t1".to_string(),
                    name: "missing".to_string(),
                    input: json!({}),
                }],
            ),
            reply("end_turn", vec![MessageContent::Text { text: "sorry".to_string() }]),
        ]);
        let tools = ToolManager::new();
        let mut messages = vec![Message::user("go")];

        let result = run_agent_loop(&model, &mut messages, None, &tools, 5)
            .await
            .unwrap();

        assert!(result.tool_calls[0].is_error);
        match &messages[2].content[0] {
            MessageContent::ToolResult { is_error, .. } => assert!(*is_error),
            other => panic!("unexpected block: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_agent_loop_iteration_limit() {
        let looping = (0..3)
            .map(|i| {
                reply(
                    "tool_use",
                    vec![MessageContent::ToolUse {
                        id: format!("t{}", i),
                        name: "echo".to_string(),
                        input: json!({}),
                    }],
                )
            })
            .collect();
        let model = ScriptedModel::new(looping);
        let mut tools = ToolManager::new();
        tools.register(Arc::new(EchoTool));
        let mut messages = vec![Message::user("go")];

        let result = run_agent_loop(&model, &mut messages, None, &tools, 2)
            .await
            .unwrap();
        assert!(result.hit_iteration_limit);
        assert_eq!(result.tool_calls.len(), 2);
    }

    #[tokio::test]
    async fn test_claude_request_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "test-model",
                "content": [{"type": "text", "text": "Hi there"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 5, "output_tokens": 2}
            })))
            .mount(&server)
            .await;

        let client =
            LlmClient::with_base_url(&llm_config(LlmProvider::Claude), server.uri()).unwrap();
        let request = MessagesRequest {
            model: client.model().to_string(),
            max_tokens: 128,
            system: None,
            messages: vec![Message::user("hello")],
            tools: None,
        };
        let response = client.messages(request).await.unwrap();
        assert_eq!(response.text(), "Hi there");
    }

    #[tokio::test]
    async fn test_openai_error_status_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client =
            LlmClient::with_base_url(&llm_config(LlmProvider::OpenAi), server.uri()).unwrap();
        let request = MessagesRequest {
            model: client.model().to_string(),
            max_tokens: 128,
            system: None,
            messages: vec![Message::user("hello")],
            tools: None,
        };
        let err = client.messages(request).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("503"));
    }
}
