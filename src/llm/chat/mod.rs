pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use std::error::Error as StdError;
use std::sync::Arc;

use super::LlmConfig;
use self::openai::OpenAIChatClient;
use crate::error::Result;
use crate::functions::{ FunctionCall, FunctionDefinition };
use crate::models::chat::{ ChatMessage, Role };

/// One entry of the transcript sent to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ModelMessage {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), name: None, function_call: None }
    }

    /// The assistant turn that requested a function.
    pub fn function_request(call: FunctionCall) -> Self {
        Self { role: Role::Assistant, content: None, name: None, function_call: Some(call) }
    }

    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: Some(content.into()),
            name: Some(name.into()),
            function_call: None,
        }
    }
}

impl From<&ChatMessage> for ModelMessage {
    fn from(message: &ChatMessage) -> Self {
        // A function-role entry without a name is rejected by the API, so
        // client-supplied ones are downgraded to user text.
        let role = match message.role {
            Role::Function => Role::User,
            other => other,
        };
        ModelMessage::text(role, message.content.clone())
    }
}

/// What a completion produced: either final text or a request to run a function.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelReply {
    Text(String),
    FunctionCall(FunctionCall),
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Requests one completion. `functions` is attached as the callable catalog
    /// when present.
    async fn complete(
        &self,
        messages: &[ModelMessage],
        functions: Option<&[FunctionDefinition]>
    ) -> Result<ModelReply>;

    fn get_model(&self) -> String;
}

pub fn new_client(
    config: &LlmConfig
) -> std::result::Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
