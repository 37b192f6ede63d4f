use std::io::ErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::services::{ExtractedPdf, TextExtractor};

const PAGE_BREAK: char = '\u{c}';

/// Extracts text with poppler's `pdftotext`, piping the PDF through stdin.
pub struct PdfToText {
    program: String,
}

impl PdfToText {
    pub fn new() -> Self {
        Self {
            program: "pdftotext".to_string(),
        }
    }
}

#[async_trait]
impl TextExtractor for PdfToText {
    async fn extract(&self, pdf: &[u8]) -> AppResult<ExtractedPdf> {
        let mut child = Command::new(&self.program)
            .args(["-enc", "UTF-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => AppError::Template(format!(
                    "{} not found; install poppler-utils to import PDF templates",
                    self.program
                )),
                _ => AppError::Io(err),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Template("could not open pdftotext stdin".to_string()))?;
        let input = pdf.to_vec();
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&input).await;
            drop(stdin);
            written
        });

        let output = child.wait_with_output().await?;
        // A broken pipe here just means pdftotext gave up early; its exit code says why.
        if let Ok(Err(err)) = writer.await {
            debug!(%err, "pdftotext closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Template(format!(
                "PDF parsing failed: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(ExtractedPdf {
            pages: count_pages(&text),
            text: text.replace(PAGE_BREAK, "\n"),
        })
    }
}

/// pdftotext ends every page with a form feed.
fn count_pages(text: &str) -> usize {
    text.matches(PAGE_BREAK).count().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_form_feeds_as_pages() {
        assert_eq!(count_pages("one\u{c}two\u{c}"), 2);
        assert_eq!(count_pages("no breaks"), 1);
    }

    #[tokio::test]
    async fn missing_binary_is_a_template_error() {
        let extractor = PdfToText {
            program: "pdftotext-definitely-not-installed".to_string(),
        };
        let err = extractor.extract(b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, AppError::Template(_)));
    }
}
