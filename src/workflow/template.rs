use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::context::AppContext;
use crate::domain::template::{structure, validate_pdf};
use crate::error::{AppError, AppResult};
use crate::store::templates::template_name_from_path;
use crate::store::{Template, TemplateStore};

const PREVIEW_CHARS: usize = 500;

pub struct TemplateImport {
    pub template: Template,
    pub pages: usize,
}

impl TemplateImport {
    /// First few hundred characters of the structured text.
    pub fn preview(&self) -> String {
        let mut preview: String = self.template.content.chars().take(PREVIEW_CHARS).collect();
        if preview.len() < self.template.content.len() {
            preview.push_str("...");
        }
        preview
    }
}

/// Validates a PDF, extracts its text, splits it into sections and stores it
/// as a new template.
pub async fn import_template(
    ctx: &AppContext,
    path: &Path,
    name: Option<&str>,
) -> AppResult<TemplateImport> {
    let bytes = fs::read(path)?;
    let validation = validate_pdf(&bytes);
    if !validation.valid {
        let reason = validation
            .error
            .unwrap_or_else(|| "Invalid PDF file format".to_string());
        return Err(AppError::Template(reason));
    }

    let extracted = ctx.text_extractor.extract(&bytes).await?;
    let content = structure(&extracted.text);
    if content.is_empty() {
        warn!(path = %path.display(), "PDF contained no extractable text");
    }

    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| template_name_from_path(path));

    let mut store = TemplateStore::load(&ctx.config.data_dir)?;
    let id = store.insert(&name, &content);
    store.save()?;
    let template = store.get(&id)?.clone();

    info!(%id, pages = extracted.pages, "imported template");
    Ok(TemplateImport {
        template,
        pages: extracted.pages,
    })
}
