use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use tokio::fs::{ self, OpenOptions };
use tokio::io::AsyncWriteExt;

use super::{ format_line, matches_term, not_found, validate_conversation_id, HistoryStore };
use crate::error::Result;
use crate::models::chat::Role;

const EXTENSION: &str = "txt";

/// One `<id>.txt` per conversation. The directory is created on first write.
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    fn path_for(&self, conversation_id: &str) -> Result<PathBuf> {
        validate_conversation_id(conversation_id)?;
        Ok(self.dir.join(format!("{}.{}", conversation_id, EXTENSION)))
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<()> {
        let path = self.path_for(conversation_id)?;
        fs::create_dir_all(&self.dir).await?;

        let mut line = format_line(Utc::now(), role.as_str(), content);
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        debug!("Appended {} entry to {}", role, path.display());
        Ok(())
    }

    async fn read_all(&self, conversation_id: &str) -> Result<Vec<String>> {
        let path = self.path_for(conversation_id)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(conversation_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn search(&self, term: &str) -> Result<Vec<String>> {
        let lowered = term.to_lowercase();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e.into());
            }
        };

        let mut matches = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(id) => id.to_string(),
                None => {
                    continue;
                }
            };
            let contents = fs::read_to_string(&path).await?;
            if contents.lines().any(|line| matches_term(line, &lowered)) {
                matches.push(id);
            }
        }
        matches.sort();
        matches.dedup();
        Ok(matches)
    }
}
