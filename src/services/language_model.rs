use std::future::Future;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::LlmProvider;
use crate::domain::ticket::Ticket;
use crate::error::AppResult;
use crate::services::ConnectionStatus;

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    fn provider(&self) -> LlmProvider;
    async fn generate(&self, ticket: &Ticket, template: &str) -> AppResult<String>;
    async fn stream(&self, ticket: &Ticket, template: &str) -> AppResult<ChunkStream>;
    async fn test_connection(&self) -> ConnectionStatus;
}

const SYSTEM_PROMPT: &str = "You are a QA Engineer. Generate a comprehensive test plan based on the provided JIRA ticket and following the structure of the template below.";
const BRIEF_SYSTEM_PROMPT: &str = "You are a QA Engineer. Generate a comprehensive test plan.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrompt {
    pub system: String,
    pub user: String,
}

impl PlanPrompt {
    pub fn full(ticket: &Ticket, template: &str) -> Self {
        let user = format!(
            "
JIRA Ticket Data:
- Key: {key}
- Summary: {summary}
- Priority: {priority}
- Description: {description}
- Acceptance Criteria: {criteria}

Template Structure:
{template}

Instructions:
1. Map ticket details to appropriate sections
2. Maintain template formatting
3. Add specific test scenarios based on acceptance criteria
4. Include both positive and negative test cases
5. Consider edge cases and boundary conditions

Generate a complete test plan following the template structure above.",
            key = ticket.key,
            summary = ticket.summary,
            priority = ticket.priority,
            description = ticket.description,
            criteria = criteria_or_default(ticket),
        );
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user,
        }
    }

    pub fn brief(ticket: &Ticket, template: &str) -> Self {
        let user = format!(
            "
JIRA Ticket: {key} - {summary}
Priority: {priority}
Description: {description}
Acceptance Criteria: {criteria}

Template:
{template}

Generate a test plan following this template.",
            key = ticket.key,
            summary = ticket.summary,
            priority = ticket.priority,
            description = ticket.description,
            criteria = criteria_or_default(ticket),
        );
        Self {
            system: BRIEF_SYSTEM_PROMPT.to_string(),
            user,
        }
    }

    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

fn criteria_or_default(ticket: &Ticket) -> &str {
    let criteria = ticket.acceptance_criteria.trim();
    if criteria.is_empty() {
        "Not specified"
    } else {
        criteria
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Done,
}

#[derive(Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<AppResult<String>>,
}

impl ChunkSender {
    /// Returns false once the consumer is gone.
    pub async fn send(&self, chunk: String) -> bool {
        if chunk.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(Ok(chunk)).await.is_ok()
    }
}

/// At most one chunk is buffered ahead of the consumer. An error ends the
/// stream without `Done`; cancelling or dropping aborts the producer.
pub struct ChunkStream {
    receiver: mpsc::Receiver<AppResult<String>>,
    producer: Option<JoinHandle<()>>,
    finished: bool,
}

impl ChunkStream {
    pub fn spawn<F, Fut>(produce: F) -> Self
    where
        F: FnOnce(ChunkSender) -> Fut,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let (tx, receiver) = mpsc::channel(1);
        let errors = tx.clone();
        let work = produce(ChunkSender { tx });

        let producer = tokio::spawn(async move {
            if let Err(err) = work.await {
                let _ = errors.send(Err(err)).await;
            }
        });

        Self {
            receiver,
            producer: Some(producer),
            finished: false,
        }
    }

    pub async fn next(&mut self) -> Option<AppResult<StreamEvent>> {
        if self.finished {
            return None;
        }
        match self.receiver.recv().await {
            Some(Ok(chunk)) => Some(Ok(StreamEvent::Chunk(chunk))),
            Some(Err(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            None => {
                self.finished = true;
                Some(Ok(StreamEvent::Done))
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        self.receiver.close();
        self.finished = true;
    }

    pub async fn forward<S>(mut self, mut sink: S) -> AppResult<String>
    where
        S: FnMut(&str) -> AppResult<()>,
    {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event? {
                StreamEvent::Chunk(chunk) => {
                    if let Err(err) = sink(&chunk) {
                        self.cancel();
                        return Err(err);
                    }
                    text.push_str(&chunk);
                }
                StreamEvent::Done => break,
            }
        }
        Ok(text)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}
