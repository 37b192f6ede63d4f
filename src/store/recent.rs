use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ticket::Ticket;
use crate::error::AppResult;
use crate::store::{load_json, save_json};

const RECENT_FILE_NAME: &str = "recent_tickets.json";
const RECENT_LIMIT: usize = 10;
pub const RECENT_PAGE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentTicket {
    pub ticket: Ticket,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct RecentFile {
    tickets: Vec<RecentTicket>,
}

/// Recently fetched tickets, newest last on disk.
pub struct RecentTickets {
    file_path: PathBuf,
    file: RecentFile,
}

impl RecentTickets {
    pub fn load(dir: &Path) -> AppResult<Self> {
        let file_path = dir.join(RECENT_FILE_NAME);
        let file = load_json(&file_path)?;
        Ok(Self { file_path, file })
    }

    pub fn record(&mut self, ticket: &Ticket) {
        self.file
            .tickets
            .retain(|recent| recent.ticket.key != ticket.key);
        self.file.tickets.push(RecentTicket {
            ticket: ticket.clone(),
            fetched_at: Utc::now(),
        });

        if self.file.tickets.len() > RECENT_LIMIT {
            let overflow = self.file.tickets.len() - RECENT_LIMIT;
            self.file.tickets.drain(0..overflow);
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<&RecentTicket> {
        self.file.tickets.iter().rev().take(limit).collect()
    }

    pub fn save(&self) -> AppResult<()> {
        save_json(&self.file_path, &self.file)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn ticket(key: &str) -> Ticket {
        Ticket {
            key: key.to_string(),
            summary: format!("summary of {key}"),
            description: String::new(),
            priority: "Medium".to_string(),
            status: "Unknown".to_string(),
            assignee: None,
            labels: BTreeSet::new(),
            acceptance_criteria: String::new(),
        }
    }

    #[test]
    fn refetch_moves_ticket_to_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut recent = RecentTickets::load(dir.path()).unwrap();
        recent.record(&ticket("QA-1"));
        recent.record(&ticket("QA-2"));
        recent.record(&ticket("QA-1"));

        let keys: Vec<_> = recent
            .recent(RECENT_PAGE)
            .iter()
            .map(|entry| entry.ticket.key.clone())
            .collect();
        assert_eq!(keys, vec!["QA-1", "QA-2"]);
    }

    #[test]
    fn keeps_last_ten() {
        let dir = tempfile::tempdir().unwrap();
        let mut recent = RecentTickets::load(dir.path()).unwrap();
        for n in 0..12 {
            recent.record(&ticket(&format!("QA-{n}")));
        }
        recent.save().unwrap();

        let reloaded = RecentTickets::load(dir.path()).unwrap();
        assert_eq!(reloaded.recent(usize::MAX).len(), RECENT_LIMIT);
        assert_eq!(reloaded.recent(RECENT_PAGE).len(), RECENT_PAGE);
        assert_eq!(reloaded.recent(1)[0].ticket.key, "QA-11");
    }
}
