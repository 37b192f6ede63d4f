pub mod issue_tracker;
pub mod language_model;
pub mod text_extractor;

use std::fmt;

pub use issue_tracker::IssueTrackerService;
pub use language_model::{ChunkStream, LanguageModelService};
pub use text_extractor::{ExtractedPdf, TextExtractor};

/// Result of a connection check. Checks report failure here instead of
/// returning an error so callers can print it as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

impl ConnectionStatus {
    pub fn connected(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.success { "ok" } else { "failed" };
        write!(f, "[{mark}] {}", self.message)
    }
}
