use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ format_line, matches_term, not_found, HistoryStore };
use crate::error::Result;
use crate::models::chat::Role;

/// Process-local history, lost on restart.
#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<()> {
        let line = format_line(Utc::now(), role.as_str(), content);
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(conversation_id.to_string())
            .or_default()
            .extend(line.lines().map(str::to_string));
        Ok(())
    }

    async fn read_all(&self, conversation_id: &str) -> Result<Vec<String>> {
        self.conversations
            .read().await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| not_found(conversation_id))
    }

    async fn search(&self, term: &str) -> Result<Vec<String>> {
        let lowered = term.to_lowercase();
        let conversations = self.conversations.read().await;
        let mut matches: Vec<String> = conversations
            .iter()
            .filter(|(_, lines)| lines.iter().any(|line| matches_term(line, &lowered)))
            .map(|(id, _)| id.clone())
            .collect();
        matches.sort();
        Ok(matches)
    }
}
