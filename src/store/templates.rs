use std::path::{Path, PathBuf};

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::template::{DEFAULT_TEMPLATE, DEFAULT_TEMPLATE_NAME};
use crate::error::{AppError, AppResult};
use crate::store::{load_json, save_json};

const TEMPLATES_FILE_NAME: &str = "templates.json";
const DEFAULT_TEMPLATE_ID: &str = "default";
const ID_LENGTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub content: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct TemplatesFile {
    templates: Vec<Template>,
}

/// Template library kept in `templates.json`. The built-in default template
/// is seeded on first load and cannot be removed.
pub struct TemplateStore {
    file_path: PathBuf,
    file: TemplatesFile,
}

impl TemplateStore {
    pub fn load(dir: &Path) -> AppResult<Self> {
        let file_path = dir.join(TEMPLATES_FILE_NAME);
        let mut file: TemplatesFile = load_json(&file_path)?;

        if !file.templates.iter().any(|template| template.is_default) {
            file.templates.insert(
                0,
                Template {
                    id: DEFAULT_TEMPLATE_ID.to_string(),
                    name: DEFAULT_TEMPLATE_NAME.to_string(),
                    content: DEFAULT_TEMPLATE.to_string(),
                    is_default: true,
                    created_at: Utc::now(),
                },
            );
        }

        Ok(Self { file_path, file })
    }

    /// Newest first, default template included.
    pub fn list(&self) -> Vec<&Template> {
        let mut templates: Vec<&Template> = self.file.templates.iter().collect();
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        templates
    }

    pub fn get(&self, id: &str) -> AppResult<&Template> {
        self.file
            .templates
            .iter()
            .find(|template| template.id == id)
            .ok_or_else(|| AppError::NotFound(format!("template {id} not found")))
    }

    pub fn default_template(&self) -> AppResult<&Template> {
        self.file
            .templates
            .iter()
            .find(|template| template.is_default)
            .ok_or_else(|| AppError::NotFound("no default template".to_string()))
    }

    /// Adds a template and returns its id. Re-adding identical name and
    /// content replaces the earlier copy.
    pub fn insert(&mut self, name: &str, content: &str) -> String {
        let id = Self::compute_id(name, content);
        self.file.templates.retain(|template| template.id != id);
        self.file.templates.push(Template {
            id: id.clone(),
            name: name.to_string(),
            content: content.to_string(),
            is_default: false,
            created_at: Utc::now(),
        });
        info!(%id, %name, "stored template");
        id
    }

    pub fn remove(&mut self, id: &str) -> AppResult<Template> {
        let position = self
            .file
            .templates
            .iter()
            .position(|template| template.id == id)
            .ok_or_else(|| AppError::NotFound(format!("template {id} not found")))?;

        if self.file.templates[position].is_default {
            return Err(AppError::Template(
                "cannot delete the default template".to_string(),
            ));
        }
        Ok(self.file.templates.remove(position))
    }

    pub fn save(&self) -> AppResult<()> {
        save_json(&self.file_path, &self.file)
    }

    pub fn compute_id(name: &str, content: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(content.as_bytes());
        let mut id = hasher.finalize().to_hex().to_string();
        id.truncate(ID_LENGTH);
        id
    }
}

/// Display name for an uploaded file: its stem without a trailing `.pdf`.
pub fn template_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string());
    let cut = file_name.len().saturating_sub(4);
    match file_name.get(cut..) {
        Some(suffix) if cut > 0 && suffix.eq_ignore_ascii_case(".pdf") => {
            file_name[..cut].to_string()
        }
        _ => file_name,
    }
}
