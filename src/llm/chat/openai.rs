use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::time::Duration;

use super::{ ChatClient, ModelMessage, ModelReply };
use crate::error::{ AgentError, Result };
use crate::functions::{ FunctionCall, FunctionDefinition };
use crate::llm::{ LlmConfig, LlmType };

/// Chat completions client for OpenAI and the providers that mirror its API.
pub struct OpenAIChatClient {
    http: HttpClient,
    llm_type: LlmType,
    model: String,
    url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ModelMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<&'a [FunctionDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

impl OpenAIChatClient {
    pub fn new(
        llm_type: LlmType,
        api_key: Option<String>,
        model: String,
        base_url: String,
        timeout: Duration
    ) -> std::result::Result<Self, Box<dyn StdError + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
                    format!("Invalid API key format: {}", e)
                )?
            );
        }

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            llm_type,
            model,
            url: completions_url(&base_url),
        })
    }

    pub fn from_config(config: &LlmConfig) -> std::result::Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type.requires_api_key() && config.api_key.is_none() {
            return Err(format!("{} API key is required (CHAT_API_KEY)", config.llm_type).into());
        }
        Self::new(
            config.llm_type,
            config.api_key.clone(),
            config.model(),
            config.endpoint(),
            config.timeout
        )
    }
}

/// Accepts either a bare host or a full completions URL.
fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        messages: &[ModelMessage],
        functions: Option<&[FunctionDefinition]>
    ) -> Result<ModelReply> {
        let functions = functions.filter(|f| !f.is_empty());
        let req = OpenAIChatRequest {
            model: &self.model,
            messages,
            functions,
            function_call: functions.map(|_| "auto"),
            temperature: 0.2,
        };

        debug!(
            "{} completion: {} messages, functions attached: {}",
            self.llm_type,
            messages.len(),
            functions.is_some()
        );
        let resp = self.http
            .post(&self.url)
            .json(&req)
            .send().await
            .map_err(|e| AgentError::Model(format!("request to {} failed: {}", self.llm_type, e)))?;

        let status = resp.status();
        let body = resp
            .text().await
            .map_err(|e| AgentError::Model(format!("failed to read {} response: {}", self.llm_type, e)))?;
        debug!("{} completion status: {}", self.llm_type, status);
        if !status.is_success() {
            return Err(AgentError::Model(format!("{} returned {}: {}", self.llm_type, status, body)));
        }

        let parsed: OpenAIResponse = serde_json
            ::from_str(&body)
            .map_err(|e| AgentError::Model(format!("unreadable completion: {}", e)))?;
        let message = parsed.choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Model(format!("No response from {} API", self.llm_type)))?
            .message;

        match message.function_call {
            Some(call) => Ok(ModelReply::FunctionCall(call)),
            None => Ok(ModelReply::Text(message.content.unwrap_or_default())),
        }
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
