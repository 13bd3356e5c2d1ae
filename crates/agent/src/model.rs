use async_trait::async_trait;
use thiserror::Error;

use tailor_core::domain::command::ProfileCommand;

use crate::tools::ToolCallError;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error (status {status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) => false,
        }
    }
}

/// One entry in the conversation transcript sent to the model. Kept in terms
/// of [`ProfileCommand`] so the runtime never sees provider wire formats.
#[derive(Clone, Debug)]
pub enum AgentMessage {
    System(String),
    User(String),
    Assistant { reply: Option<String>, commands: Vec<CommandCall> },
    CommandResult { call_id: String, output: String },
}

/// A tool call as the model issued it. The raw name and arguments are kept so
/// the call can be echoed back into the transcript; `parsed` holds the decode
/// result the runtime acts on.
#[derive(Clone, Debug)]
pub struct CommandCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: String,
    pub parsed: Result<ProfileCommand, ToolCallError>,
}

/// What the model produced for one round: optional text, plus any commands.
#[derive(Clone, Debug, Default)]
pub struct AgentTurn {
    pub reply: Option<String>,
    pub commands: Vec<CommandCall>,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn converse(&self, transcript: &[AgentMessage]) -> Result<AgentTurn, LlmError>;
}
