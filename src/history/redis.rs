use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use log::error;
use redis::{ AsyncCommands, Client };
use serde::{ Serialize, Deserialize };
use std::error::Error;

use super::{ format_line, matches_term, not_found, validate_conversation_id, HistoryStore };
use crate::cli::Args;
use crate::error::{ AgentError, Result };
use crate::models::chat::Role;

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: String,
    content: String,
    timestamp: i64,
}

impl StoredMessage {
    fn to_lines(&self) -> Vec<String> {
        let at = DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default();
        format_line(at, &self.role, &self.content).lines().map(str::to_string).collect()
    }
}

/// One redis list per conversation at `<prefix><id>`, entries pushed to the tail.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
    scan_count: usize,
}

impl RedisHistoryStore {
    pub fn new(args: Args) -> std::result::Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(args.history_host.as_str())?,
            key_prefix: args.history_redis_prefix,
            scan_count: args.history_redis_scan_count.max(1),
        })
    }

    async fn get_connection(&self) -> std::result::Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn key_for(&self, conversation_id: &str) -> Result<String> {
        validate_conversation_id(conversation_id)?;
        Ok(format!("{}{}", self.key_prefix, conversation_id))
    }

    fn decode(entries: &[String]) -> Vec<String> {
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_str::<StoredMessage>(entry) {
                Ok(msg) => lines.extend(msg.to_lines()),
                Err(e) => error!("Error parsing history entry: {}", e),
            }
        }
        lines
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<()> {
        let key = self.key_for(conversation_id)?;
        let mut conn = self.get_connection().await?;

        let message = StoredMessage {
            role: role.as_str().to_string(),
            content: content.to_string(),
            timestamp: Utc::now().timestamp(),
        };
        let json_msg = serde_json
            ::to_string(&message)
            .map_err(|e| AgentError::History(e.to_string()))?;
        let _: i64 = conn.rpush(&key, &json_msg).await?;
        Ok(())
    }

    async fn read_all(&self, conversation_id: &str) -> Result<Vec<String>> {
        let key = self.key_for(conversation_id)?;
        let mut conn = self.get_connection().await?;
        let entries: Vec<String> = conn.lrange(&key, 0, -1).await?;
        if entries.is_empty() {
            return Err(not_found(conversation_id));
        }
        Ok(Self::decode(&entries))
    }

    async fn search(&self, term: &str) -> Result<Vec<String>> {
        let lowered = term.to_lowercase();
        let mut conn = self.get_connection().await?;
        let pattern = format!("{}*", self.key_prefix);

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis
                ::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn).await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();

        let mut matches = Vec::new();
        for key in keys {
            let entries: Vec<String> = conn.lrange(&key, 0, -1).await?;
            if Self::decode(&entries).iter().any(|line| matches_term(line, &lowered)) {
                if let Some(id) = key.strip_prefix(&self.key_prefix) {
                    matches.push(id.to_string());
                }
            }
        }
        Ok(matches)
    }
}
