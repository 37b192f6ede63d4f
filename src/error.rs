use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("issue tracker error: {0}")]
    IssueTracker(String),
    #[error("language model error: {0}")]
    LanguageModel(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("malformed ticket: {0}")]
    MalformedTicket(String),
    #[error("invalid ticket id '{0}', expected PROJECT-123")]
    InvalidTicketId(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;
