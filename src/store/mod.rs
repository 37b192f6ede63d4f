pub mod history;
pub mod recent;
pub mod templates;

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

pub use history::HistoryStore;
pub use recent::RecentTickets;
pub use templates::{Template, TemplateStore};

/// Reads a JSON store file, treating a missing file as empty.
fn load_json<T>(path: &Path) -> AppResult<T>
where
    T: DeserializeOwned + Default,
{
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
            AppError::Configuration(format!("invalid store file {}: {err}", path.display()))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(AppError::Io(err)),
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}
