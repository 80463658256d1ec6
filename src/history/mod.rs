mod file;
mod memory;
mod redis;
use async_trait::async_trait;
use chrono::{ DateTime, SecondsFormat, Utc };
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::{ AgentError, Result };
use crate::models::chat::Role;

pub use self::file::FileHistoryStore;
pub use self::memory::MemoryHistoryStore;
pub use self::redis::RedisHistoryStore;

lazy_static! {
    static ref CONVERSATION_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap();
}

/// Append-only conversation log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<()>;

    /// Every recorded line, oldest first. `NotFound` for an unknown conversation.
    async fn read_all(&self, conversation_id: &str) -> Result<Vec<String>>;

    /// Ids of conversations with a line containing `term`, case-insensitively.
    /// Sorted, no duplicates.
    async fn search(&self, term: &str) -> Result<Vec<String>>;
}

pub fn create_history_store(
    args: &Args
) -> std::result::Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "file" => Ok(Arc::new(FileHistoryStore::new(&args.history_dir))),
        "redis" => {
            let store = RedisHistoryStore::new(args.clone())?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    args: &Args
) -> std::result::Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    let location = match args.history_type.to_lowercase().as_str() {
        "file" => args.history_dir.as_str(),
        "redis" => args.history_host.as_str(),
        _ => "process memory",
    };
    info!("Chat history will be stored in: {} at {}", args.history_type, location);
    create_history_store(args)
}

/// Conversation ids become file names and redis keys, so only plain tokens pass.
pub fn validate_conversation_id(conversation_id: &str) -> Result<()> {
    if CONVERSATION_ID.is_match(conversation_id) {
        Ok(())
    } else {
        Err(AgentError::InvalidRequest(format!("invalid conversation id '{}'", conversation_id)))
    }
}

pub(crate) fn format_line(at: DateTime<Utc>, role: &str, content: &str) -> String {
    format!("[{}] [{}]: {}", at.to_rfc3339_opts(SecondsFormat::Secs, true), role, content)
}

pub(crate) fn matches_term(text: &str, lowered_term: &str) -> bool {
    text.to_lowercase().contains(lowered_term)
}

pub(crate) fn not_found(conversation_id: &str) -> AgentError {
    AgentError::NotFound(format!("conversation '{}' not found", conversation_id))
}
