pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;

use crate::cli::Args;

/// Providers reachable through the OpenAI-compatible chat completions protocol
/// with function calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    OpenAI,
    Groq,
    XAI,
    DeepSeek,
    Ollama,
}

impl LlmType {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmType::OpenAI => "https://api.openai.com",
            LlmType::Groq => "https://api.groq.com/openai",
            LlmType::XAI => "https://api.x.ai",
            LlmType::DeepSeek => "https://api.deepseek.com",
            LlmType::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmType::OpenAI => "gpt-4-turbo",
            LlmType::Groq => "llama-3.3-70b-versatile",
            LlmType::XAI => "grok-2-latest",
            LlmType::DeepSeek => "deepseek-chat",
            LlmType::Ollama => "llama3.1",
        }
    }

    /// Local servers run without credentials.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmType::Ollama)
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmType::OpenAI => "openai",
            LlmType::Groq => "groq",
            LlmType::XAI => "xai",
            LlmType::DeepSeek => "deepseek",
            LlmType::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}

impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmType::OpenAI),
            "groq" => Ok(LlmType::Groq),
            "xai" => Ok(LlmType::XAI),
            "deepseek" => Ok(LlmType::DeepSeek),
            "ollama" => Ok(LlmType::Ollama),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Unsupported LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::OpenAI,
            api_key: None,
            completion_model: None,
            base_url: None,
            timeout: Duration::from_secs(15),
        }
    }
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Result<Self, ParseLlmTypeError> {
        let llm_type: LlmType = args.chat_llm_type.parse()?;
        Ok(Self {
            llm_type,
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.trim().is_empty()),
            completion_model: args.chat_model.clone().filter(|m| !m.trim().is_empty()),
            base_url: args.chat_base_url.clone().filter(|u| !u.trim().is_empty()),
            timeout: Duration::from_secs(args.chat_timeout_secs),
        })
    }

    pub fn model(&self) -> String {
        self.completion_model.clone().unwrap_or_else(|| self.llm_type.default_model().to_string())
    }

    pub fn endpoint(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| self.llm_type.default_base_url().to_string())
    }
}
