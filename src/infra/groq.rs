use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{GroqSettings, LlmProvider};
use crate::domain::ticket::Ticket;
use crate::error::{AppError, AppResult};
use crate::infra::llm::{LineBuffer, http_client};
use crate::services::language_model::{ChunkSender, PlanPrompt};
use crate::services::{ChunkStream, ConnectionStatus, LanguageModelService};

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS: u32 = 4096;
const EMPTY_COMPLETION: &str = "No content generated";

/// Groq's OpenAI-compatible chat completion API.
pub struct GroqClient {
    http: Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn new(settings: &GroqSettings) -> AppResult<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::Configuration("Groq API key not configured".to_string()))?;

        Ok(Self {
            http: http_client(REQUEST_TIMEOUT)?,
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    fn request<'a>(&'a self, prompt: &'a PlanPrompt, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: MAX_TOKENS,
            stream,
        }
    }

    async fn post_completion(&self, body: &ChatRequest<'_>) -> AppResult<reqwest::Response> {
        let response = self
            .http
            .post(format!("{GROQ_API_BASE}/chat/completions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|err| AppError::LanguageModel(format!("Groq generation failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LanguageModel(format!(
                "Groq generation failed: {status} - {body}"
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LanguageModelService for GroqClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Groq
    }

    async fn generate(&self, ticket: &Ticket, template: &str) -> AppResult<String> {
        let prompt = PlanPrompt::full(ticket, template);
        info!(model = %self.model, key = %ticket.key, "generating test plan with Groq");

        let response = self.post_completion(&self.request(&prompt, false)).await?;
        let completion: ChatCompletion = response.json().await.map_err(|err| {
            AppError::LanguageModel(format!("failed to parse Groq response: {err}"))
        })?;

        Ok(completion
            .into_content()
            .unwrap_or_else(|| EMPTY_COMPLETION.to_string()))
    }

    async fn stream(&self, ticket: &Ticket, template: &str) -> AppResult<ChunkStream> {
        let prompt = PlanPrompt::brief(ticket, template);
        info!(model = %self.model, key = %ticket.key, "streaming test plan from Groq");

        let response = self.post_completion(&self.request(&prompt, true)).await?;
        Ok(ChunkStream::spawn(|sender| pump_events(response, sender)))
    }

    async fn test_connection(&self) -> ConnectionStatus {
        let response = self
            .http
            .get(format!("{GROQ_API_BASE}/models"))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                return ConnectionStatus::failed(format!(
                    "Groq connection failed: {}",
                    response.status()
                ));
            }
            Err(err) => return ConnectionStatus::failed(format!("Groq connection failed: {err}")),
        };

        match response.json::<ModelList>().await {
            Ok(list) => ConnectionStatus::connected(format!(
                "Connected. Available models: {}",
                list.describe()
            )),
            Err(err) => ConnectionStatus::failed(format!("Groq connection failed: {err}")),
        }
    }
}

async fn pump_events(mut response: reqwest::Response, sender: ChunkSender) -> AppResult<()> {
    let mut lines = LineBuffer::default();
    loop {
        let bytes = response
            .chunk()
            .await
            .map_err(|err| AppError::LanguageModel(format!("Groq stream failed: {err}")))?;
        let Some(bytes) = bytes else {
            break;
        };

        for line in lines.push(&bytes) {
            if !forward_event(&line, &sender).await {
                return Ok(());
            }
        }
    }

    if let Some(line) = lines.finish() {
        if !forward_event(&line, &sender).await {
            return Ok(());
        }
    }
    debug!("Groq stream closed without [DONE]");
    Ok(())
}

/// Returns false when the stream should stop.
async fn forward_event(line: &str, sender: &ChunkSender) -> bool {
    match parse_event(line) {
        SseEvent::Delta(text) => sender.send(text).await,
        SseEvent::Done => false,
        SseEvent::Skip => true,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Delta(String),
    Done,
    Skip,
}

/// Reads one server-sent-event line of a streamed chat completion.
fn parse_event(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
            .map_or(SseEvent::Skip, SseEvent::Delta),
        Err(err) => {
            debug!(%err, "skipping unparseable Groq event");
            SseEvent::Skip
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

impl ChatCompletion {
    fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
    }
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl ModelList {
    fn describe(&self) -> String {
        if self.data.is_empty() {
            return "No models found".to_string();
        }
        self.data
            .iter()
            .map(|model| model.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key: Option<&str>) -> GroqSettings {
        GroqSettings {
            api_key: key.map(str::to_string),
            model: "llama3-70b-8192".to_string(),
            temperature: 0.2,
        }
    }

    #[test]
    fn requires_api_key() {
        assert!(GroqClient::new(&settings(None)).is_err());
        assert!(GroqClient::new(&settings(Some("  "))).is_err());
        assert!(GroqClient::new(&settings(Some("gsk_test"))).is_ok());
    }

    #[test]
    fn serializes_chat_request() {
        let client = GroqClient::new(&settings(Some("gsk_test"))).unwrap();
        let prompt = PlanPrompt {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };
        let body = serde_json::to_value(client.request(&prompt, true)).unwrap();
        assert_eq!(body["model"], "llama3-70b-8192");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn parses_stream_events() {
        assert_eq!(
            parse_event(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            SseEvent::Delta("Hi".to_string())
        );
        assert_eq!(
            parse_event(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseEvent::Skip
        );
        assert_eq!(parse_event("data: [DONE]"), SseEvent::Done);
        assert_eq!(parse_event(": keep-alive"), SseEvent::Skip);
        assert_eq!(parse_event("data: {not json"), SseEvent::Skip);
    }

    #[test]
    fn empty_completion_has_no_content() {
        let completion: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{"content":""}}]}"#).unwrap();
        assert_eq!(completion.into_content(), None);

        let completion: ChatCompletion =
            serde_json::from_str(r##"{"choices":[{"message":{"content":"# Plan"}}]}"##).unwrap();
        assert_eq!(completion.into_content().as_deref(), Some("# Plan"));
    }

    #[tokio::test]
    async fn final_event_without_newline_is_delivered() {
        let mut lines = LineBuffer::default();
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}";
        let pending = lines.push(body.as_bytes());
        let tail = lines.finish();

        let stream = ChunkStream::spawn(move |sender| async move {
            for line in pending.iter().chain(tail.iter()) {
                if !forward_event(line, &sender).await {
                    break;
                }
            }
            Ok(())
        });
        assert_eq!(stream.forward(|_| Ok(())).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn done_event_stops_forwarding() {
        let stream = ChunkStream::spawn(|sender| async move {
            for line in ["data: [DONE]", r#"data: {"choices":[{"delta":{"content":"late"}}]}"#] {
                if !forward_event(line, &sender).await {
                    break;
                }
            }
            Ok(())
        });
        assert_eq!(stream.forward(|_| Ok(())).await.unwrap(), "");
    }

    #[test]
    fn lists_model_ids() {
        let list: ModelList =
            serde_json::from_str(r#"{"data":[{"id":"a"},{"id":"b"}]}"#).unwrap();
        assert_eq!(list.describe(), "a, b");
        let empty: ModelList = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.describe(), "No models found");
    }
}
