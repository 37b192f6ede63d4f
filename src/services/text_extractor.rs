use async_trait::async_trait;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPdf {
    pub text: String,
    pub pages: usize,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, pdf: &[u8]) -> AppResult<ExtractedPdf>;
}
