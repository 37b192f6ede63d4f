use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::{AppConfig, LlmProvider};
use crate::error::{AppError, AppResult};
use crate::infra::groq::GroqClient;
use crate::infra::ollama::OllamaClient;
use crate::services::LanguageModelService;

/// Picks the backend for `provider`, falling back to the configured default.
pub fn language_model_for(
    config: &AppConfig,
    provider: Option<LlmProvider>,
) -> AppResult<Arc<dyn LanguageModelService>> {
    let provider = provider.unwrap_or(config.llm_provider);
    let model: Arc<dyn LanguageModelService> = match provider {
        LlmProvider::Groq => Arc::new(GroqClient::new(&config.groq)?),
        LlmProvider::Ollama => Arc::new(OllamaClient::new(&config.ollama)?),
    };
    Ok(model)
}

pub(crate) fn http_client(timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| AppError::LanguageModel(format!("failed to build HTTP client: {err}")))
}

/// Reassembles newline-delimited text from arbitrarily split byte chunks.
/// Bytes are held until a full line arrives so multi-byte characters survive
/// chunk boundaries.
#[derive(Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn finish(self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.pending).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}
