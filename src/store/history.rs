use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LlmProvider;
use crate::error::AppResult;
use crate::store::{load_json, save_json};

const HISTORY_FILE_NAME: &str = "history.json";
const HISTORY_LIMIT: usize = 100;
pub const HISTORY_PAGE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub ticket_id: String,
    pub template_id: String,
    pub template_name: String,
    pub provider: LlmProvider,
    pub generated_content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct HistoryFile {
    next_id: u64,
    entries: Vec<HistoryEntry>,
}

/// Generated plans, oldest first on disk.
pub struct HistoryStore {
    file_path: PathBuf,
    file: HistoryFile,
}

pub struct NewHistoryEntry<'a> {
    pub ticket_id: &'a str,
    pub template_id: &'a str,
    pub template_name: &'a str,
    pub provider: LlmProvider,
    pub generated_content: &'a str,
}

impl HistoryStore {
    pub fn load(dir: &Path) -> AppResult<Self> {
        let file_path = dir.join(HISTORY_FILE_NAME);
        let file = load_json(&file_path)?;
        Ok(Self { file_path, file })
    }

    pub fn append(&mut self, entry: NewHistoryEntry<'_>) -> u64 {
        self.file.next_id += 1;
        let id = self.file.next_id;
        self.file.entries.push(HistoryEntry {
            id,
            ticket_id: entry.ticket_id.to_string(),
            template_id: entry.template_id.to_string(),
            template_name: entry.template_name.to_string(),
            provider: entry.provider,
            generated_content: entry.generated_content.to_string(),
            created_at: Utc::now(),
        });

        if self.file.entries.len() > HISTORY_LIMIT {
            let overflow = self.file.entries.len() - HISTORY_LIMIT;
            self.file.entries.drain(0..overflow);
        }
        id
    }

    /// Newest `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&HistoryEntry> {
        self.file.entries.iter().rev().take(limit).collect()
    }

    pub fn get(&self, id: u64) -> Option<&HistoryEntry> {
        self.file.entries.iter().find(|entry| entry.id == id)
    }

    pub fn save(&self) -> AppResult<()> {
        save_json(&self.file_path, &self.file)
    }
}
