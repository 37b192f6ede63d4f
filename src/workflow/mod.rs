pub mod template;
pub mod testplan;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use crate::config::{AppConfig, StoredConfig};
    use crate::context::{AppContext, LanguageModelFactory};
    use crate::services::{IssueTrackerService, TextExtractor};

    /// Context over fakes with all stores rooted in `dir`.
    pub fn context_with(
        dir: &Path,
        issue_tracker: Arc<dyn IssueTrackerService>,
        text_extractor: Arc<dyn TextExtractor>,
        language_models: LanguageModelFactory,
    ) -> AppContext {
        let config = AppConfig::resolve(StoredConfig::default(), dir.to_path_buf())
            .expect("default config resolves");
        AppContext::new(config, issue_tracker, text_extractor, language_models)
    }
}
