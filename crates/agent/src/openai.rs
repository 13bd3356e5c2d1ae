use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use tailor_core::config::{LlmConfig, LlmProvider};

use crate::model::{AgentMessage, AgentTurn, ChatModel, CommandCall, LlmError};
use crate::tools;

const AZURE_API_VERSION: &str = "2024-02-01";

/// Chat-completions client for the three supported providers. Azure uses the
/// deployment-scoped URL with an `api-key` header; the model name doubles as
/// the deployment name there. Ollama speaks the same protocol without a key.
pub struct OpenAiChatModel {
    http: reqwest::Client,
    provider: LlmProvider,
    api_key: Option<SecretString>,
    base_url: Option<String>,
    model: String,
    max_retries: u32,
    retry: RetryPolicy,
}

struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { base_delay_ms: 250, max_delay_ms: 4_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            provider: config.provider,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry: RetryPolicy::default(),
        })
    }

    fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::OpenAi => {
                let base = self.base_url.as_deref().unwrap_or("https://api.openai.com");
                format!("{}/v1/chat/completions", base.trim_end_matches('/'))
            }
            LlmProvider::AzureOpenAi => {
                let base = self.base_url.as_deref().unwrap_or_default().trim_end_matches('/');
                format!(
                    "{base}/openai/deployments/{model}/chat/completions?api-version={AZURE_API_VERSION}",
                    model = self.model
                )
            }
            LlmProvider::Ollama => {
                let base = self.base_url.as_deref().unwrap_or("http://localhost:11434");
                format!("{}/v1/chat/completions", base.trim_end_matches('/'))
            }
        }
    }

    fn request_body(&self, transcript: &[AgentMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": wire_messages(transcript),
            "temperature": 0,
            "tools": tools::specs(),
        })
    }

    async fn send(&self, body: &Value) -> Result<AgentTurn, LlmError> {
        let mut request = self.http.post(self.endpoint()).json(body);
        request = match (self.provider, &self.api_key) {
            (LlmProvider::AzureOpenAi, Some(key)) => request.header("api-key", key.expose_secret()),
            (_, Some(key)) => request.bearer_auth(key.expose_secret()),
            (_, None) => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), detail });
        }

        let payload: ApiResponse = response.json().await?;
        turn_from_response(payload)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn converse(&self, transcript: &[AgentMessage]) -> Result<AgentTurn, LlmError> {
        let body = self.request_body(transcript);
        debug!(
            event_name = "llm.request.start",
            provider = ?self.provider,
            model = %self.model,
            messages = transcript.len(),
            "sending chat completion request"
        );

        let mut attempt = 0_u32;
        loop {
            match self.send(&body).await {
                Ok(turn) => return Ok(turn),
                Err(error) if attempt < self.max_retries && error.is_retryable() => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        event_name = "llm.request.retry",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying chat completion request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn wire_messages(transcript: &[AgentMessage]) -> Vec<Value> {
    transcript
        .iter()
        .map(|message| match message {
            AgentMessage::System(content) => json!({ "role": "system", "content": content }),
            AgentMessage::User(content) => json!({ "role": "user", "content": content }),
            AgentMessage::Assistant { reply, commands } => {
                let mut value = json!({ "role": "assistant", "content": reply });
                if !commands.is_empty() {
                    let calls = commands
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.call_id,
                                "type": "function",
                                "function": {
                                    "name": call.tool_name,
                                    "arguments": call.arguments,
                                },
                            })
                        })
                        .collect::<Vec<_>>();
                    value["tool_calls"] = Value::Array(calls);
                }
                value
            }
            AgentMessage::CommandResult { call_id, output } => json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": output,
            }),
        })
        .collect()
}

fn turn_from_response(response: ApiResponse) -> Result<AgentTurn, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedResponse("response had no choices".to_string()))?;

    let commands = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let WireToolCall { id, function } = call;
            let parsed = tools::decode(&function.name, &function.arguments);
            CommandCall {
                call_id: id,
                tool_name: function.name,
                arguments: function.arguments,
                parsed,
            }
        })
        .collect();

    Ok(AgentTurn { reply: choice.message.content, commands })
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}
