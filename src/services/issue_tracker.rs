use async_trait::async_trait;

use crate::domain::ticket::Ticket;
use crate::error::AppResult;
use crate::services::ConnectionStatus;

#[async_trait]
pub trait IssueTrackerService: Send + Sync {
    /// Fetches and normalizes one ticket. `id` is already sanitized.
    async fn fetch_ticket(&self, id: &str) -> AppResult<Ticket>;
    async fn test_connection(&self) -> ConnectionStatus;
}
