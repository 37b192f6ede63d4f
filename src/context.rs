use std::sync::Arc;

use crate::config::{AppConfig, LlmProvider};
use crate::error::AppResult;
use crate::infra::jira::JiraClient;
use crate::infra::llm::language_model_for;
use crate::infra::pdftotext::PdfToText;
use crate::services::{IssueTrackerService, LanguageModelService, TextExtractor};

/// Builds the backend for a provider on demand, so a missing Groq key only
/// matters when Groq is actually used.
pub type LanguageModelFactory =
    Arc<dyn Fn(LlmProvider) -> AppResult<Arc<dyn LanguageModelService>> + Send + Sync>;

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub issue_tracker: Arc<dyn IssueTrackerService>,
    pub text_extractor: Arc<dyn TextExtractor>,
    language_models: LanguageModelFactory,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        issue_tracker: Arc<dyn IssueTrackerService>,
        text_extractor: Arc<dyn TextExtractor>,
        language_models: LanguageModelFactory,
    ) -> Self {
        Self {
            config,
            issue_tracker,
            text_extractor,
            language_models,
        }
    }

    /// Wires the real Jira, pdftotext and LLM clients.
    pub fn from_config(config: AppConfig) -> Self {
        let issue_tracker = Arc::new(JiraClient::new(&config.jira));
        let text_extractor = Arc::new(PdfToText::new());
        let model_config = config.clone();
        let language_models: LanguageModelFactory =
            Arc::new(move |provider| language_model_for(&model_config, Some(provider)));
        Self::new(config, issue_tracker, text_extractor, language_models)
    }

    /// The backend for `provider`, or for the configured default when `None`.
    pub fn language_model(
        &self,
        provider: Option<LlmProvider>,
    ) -> AppResult<Arc<dyn LanguageModelService>> {
        (self.language_models)(provider.unwrap_or(self.config.llm_provider))
    }
}
