use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{LlmProvider, OllamaSettings};
use crate::domain::ticket::Ticket;
use crate::error::{AppError, AppResult};
use crate::infra::llm::{LineBuffer, http_client};
use crate::services::language_model::{ChunkSender, PlanPrompt};
use crate::services::{ChunkStream, ConnectionStatus, LanguageModelService};

const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const EMPTY_COMPLETION: &str = "No content generated";

/// Local Ollama server.
pub struct OllamaClient {
    http: Client,
    status_client: Client,
    base_url: String,
    model: Option<String>,
}

impl OllamaClient {
    pub fn new(settings: &OllamaSettings) -> AppResult<Self> {
        Ok(Self {
            http: http_client(GENERATE_TIMEOUT)?,
            status_client: http_client(STATUS_TIMEOUT)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    fn model(&self) -> AppResult<&str> {
        self.model
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Ollama model not configured".to_string()))
    }

    async fn fetch_tags(&self) -> AppResult<TagsResponse> {
        let response = self
            .status_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|err| {
                AppError::LanguageModel(format!(
                    "Ollama connection error: {err}. Is Ollama running?"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::LanguageModel(format!(
                "Ollama connection failed: {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|err| AppError::LanguageModel(format!("failed to parse Ollama tags: {err}")))
    }

    /// Names of locally available models; empty when the server is unreachable.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(tags) => tags.names(),
            Err(err) => {
                warn!(%err, "could not list Ollama models");
                Vec::new()
            }
        }
    }

    async fn post_generate(&self, prompt: &PlanPrompt, stream: bool) -> AppResult<reqwest::Response> {
        let combined = prompt.combined();
        let body = GenerateRequest {
            model: self.model()?,
            prompt: &combined,
            stream,
        };

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::LanguageModel(format!("Ollama generation failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let verb = if stream { "stream" } else { "generation" };
            return Err(AppError::LanguageModel(format!(
                "Ollama {verb} failed: {status}"
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LanguageModelService for OllamaClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Ollama
    }

    async fn generate(&self, ticket: &Ticket, template: &str) -> AppResult<String> {
        let prompt = PlanPrompt::full(ticket, template);
        info!(base_url = %self.base_url, key = %ticket.key, "generating test plan with Ollama");

        let response = self.post_generate(&prompt, false).await?;
        let body: GenerateResponse = response.json().await.map_err(|err| {
            AppError::LanguageModel(format!("failed to parse Ollama response: {err}"))
        })?;

        Ok(Some(body.response)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| EMPTY_COMPLETION.to_string()))
    }

    async fn stream(&self, ticket: &Ticket, template: &str) -> AppResult<ChunkStream> {
        let prompt = PlanPrompt::brief(ticket, template);
        info!(base_url = %self.base_url, key = %ticket.key, "streaming test plan from Ollama");

        let response = self.post_generate(&prompt, true).await?;
        Ok(ChunkStream::spawn(|sender| pump_lines(response, sender)))
    }

    async fn test_connection(&self) -> ConnectionStatus {
        match self.fetch_tags().await {
            Ok(tags) => ConnectionStatus::connected(format!(
                "Connected. Available models: {}",
                tags.describe()
            )),
            Err(err) => ConnectionStatus::failed(err.to_string()),
        }
    }
}

async fn pump_lines(mut response: reqwest::Response, sender: ChunkSender) -> AppResult<()> {
    let mut lines = LineBuffer::default();
    loop {
        let bytes = response
            .chunk()
            .await
            .map_err(|err| AppError::LanguageModel(format!("Ollama stream failed: {err}")))?;
        let Some(bytes) = bytes else {
            break;
        };

        for line in lines.push(&bytes) {
            if let Some(text) = parse_line(&line) {
                if !sender.send(text).await {
                    return Ok(());
                }
            }
        }
    }

    if let Some(text) = lines.finish().as_deref().and_then(parse_line) {
        sender.send(text).await;
    }
    Ok(())
}

/// Text carried by one NDJSON line of a streamed generation. Blank and
/// unparseable lines carry nothing.
fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<StreamLine>(line) {
        Ok(parsed) => parsed.response.filter(|text| !text.is_empty()),
        Err(err) => {
            debug!(%err, "skipping partial Ollama line");
            None
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct StreamLine {
    response: Option<String>,
}

#[derive(Deserialize, Default)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl TagsResponse {
    fn names(self) -> Vec<String> {
        self.models.into_iter().map(|model| model.name).collect()
    }

    fn describe(self) -> String {
        let names = self.names();
        if names.is_empty() {
            "No models found".to_string()
        } else {
            names.join(", ")
        }
    }
}
