use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::ticket::DEFAULT_ACCEPTANCE_FIELD;
use crate::error::{AppError, AppResult};

const APP_DIR_NAME: &str = "tplan";
const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_DIR_ENV: &str = "TPLAN_CONFIG_DIR";

pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_GROQ_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Directory holding the config file and the JSON stores.
pub fn config_directory() -> AppResult<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "cannot locate a config directory; set {CONFIG_DIR_ENV}"
            ))
        })
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}

/// What is written to disk. Every field is optional so a partial file loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredConfig {
    pub jira_base_url: Option<String>,
    pub jira_username: Option<String>,
    pub jira_token: Option<String>,
    pub jira_acceptance_field: Option<String>,
    pub llm_provider: Option<String>,
    pub groq_api_key: Option<String>,
    pub groq_model: Option<String>,
    pub groq_temperature: Option<f32>,
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                AppError::Configuration(format!("invalid config file {}: {err}", path.display()))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;

        // Holds API tokens; owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        let overrides: [(&str, &mut Option<String>); 5] = [
            ("TPLAN_JIRA_BASE_URL", &mut self.jira_base_url),
            ("TPLAN_JIRA_USERNAME", &mut self.jira_username),
            ("TPLAN_JIRA_TOKEN", &mut self.jira_token),
            ("TPLAN_GROQ_API_KEY", &mut self.groq_api_key),
            ("TPLAN_LLM_PROVIDER", &mut self.llm_provider),
        ];
        for (name, slot) in overrides {
            if let Ok(value) = env::var(name) {
                if !value.trim().is_empty() {
                    *slot = Some(value.trim().to_string());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Groq,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "groq",
            LlmProvider::Ollama => "ollama",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "groq" => Ok(LlmProvider::Groq),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(AppError::Configuration(format!(
                "unknown LLM provider '{other}', expected groq or ollama"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JiraSettings {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub acceptance_field: String,
}

#[derive(Debug, Clone)]
pub struct GroqSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: Option<String>,
}

/// Resolved configuration with defaults filled in.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jira: JiraSettings,
    pub llm_provider: LlmProvider,
    pub groq: GroqSettings,
    pub ollama: OllamaSettings,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        let mut stored = StoredConfig::load()?;
        stored.apply_env();
        Self::resolve(stored, config_directory()?)
    }

    pub fn resolve(stored: StoredConfig, data_dir: PathBuf) -> AppResult<Self> {
        let llm_provider = match stored.llm_provider.as_deref().filter(|p| !p.is_empty()) {
            Some(provider) => provider.parse()?,
            None => LlmProvider::default(),
        };

        let temperature = stored.groq_temperature.unwrap_or(DEFAULT_GROQ_TEMPERATURE);
        if !is_valid_temperature(temperature) {
            return Err(AppError::Configuration(format!(
                "Groq temperature {temperature} is outside 0..=1"
            )));
        }

        if let Some(url) = stored.jira_base_url.as_deref().filter(|url| !url.trim().is_empty()) {
            check_jira_base_url(url)?;
        }

        Ok(Self {
            jira: JiraSettings {
                base_url: stored.jira_base_url,
                username: stored.jira_username,
                token: stored.jira_token,
                acceptance_field: stored
                    .jira_acceptance_field
                    .filter(|field| !field.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ACCEPTANCE_FIELD.to_string()),
            },
            llm_provider,
            groq: GroqSettings {
                api_key: stored.groq_api_key,
                model: stored
                    .groq_model
                    .filter(|model| !model.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
                temperature,
            },
            ollama: OllamaSettings {
                base_url: stored
                    .ollama_base_url
                    .filter(|url| !url.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
                model: stored.ollama_model.filter(|model| !model.trim().is_empty()),
            },
            data_dir,
        })
    }

    /// Logs what is missing for the commands that talk to remote services.
    pub fn warn_missing(&self) {
        if self.jira.base_url.is_none() {
            warn!("Jira base URL not configured; ticket fetches will fail");
        }
        if self.jira.username.is_none() {
            warn!("Jira username not configured; ticket fetches will fail");
        }
        if self.jira.token.is_none() {
            warn!("Jira token not configured; ticket fetches will fail");
        }
        match self.llm_provider {
            LlmProvider::Groq if self.groq.api_key.is_none() => {
                warn!("Groq API key not configured; generation will fail");
            }
            LlmProvider::Ollama if self.ollama.model.is_none() => {
                warn!("Ollama model not configured; generation will fail");
            }
            _ => {}
        }
    }
}

pub fn is_valid_temperature(temperature: f32) -> bool {
    (0.0..=1.0).contains(&temperature)
}

/// Rejects anything that is not an http(s) URL and warns about hosts that do
/// not look like Jira Cloud.
fn check_jira_base_url(url: &str) -> AppResult<()> {
    let url = url.trim();
    let parsed = Url::parse(url).map_err(|err| {
        AppError::Configuration(format!("Jira base URL '{url}' is not a valid URL: {err}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Configuration(format!(
            "Jira base URL '{url}' is not an http(s) URL"
        )));
    }
    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| AppError::Configuration(format!("Jira base URL '{url}' has no host")))?;

    if !is_jira_cloud_host(host) {
        warn!(%host, "Jira base URL is not an Atlassian Cloud host");
    }
    Ok(())
}

fn is_jira_cloud_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host.ends_with(".atlassian.net") || host.ends_with(".jira.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_defaults() {
        let config = AppConfig::resolve(StoredConfig::default(), PathBuf::from("/tmp")).unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Groq);
        assert_eq!(config.groq.model, DEFAULT_GROQ_MODEL);
        assert_eq!(config.groq.temperature, DEFAULT_GROQ_TEMPERATURE);
        assert_eq!(config.ollama.base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.jira.acceptance_field, DEFAULT_ACCEPTANCE_FIELD);
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!("Ollama".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert_eq!(" groq ".parse::<LlmProvider>().unwrap(), LlmProvider::Groq);
        assert!("gemini".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let stored = StoredConfig {
            groq_temperature: Some(1.5),
            ..StoredConfig::default()
        };
        assert!(AppConfig::resolve(stored, PathBuf::from("/tmp")).is_err());
        assert!(is_valid_temperature(0.0));
        assert!(is_valid_temperature(1.0));
    }

    #[test]
    fn rejects_non_http_jira_url() {
        assert!(check_jira_base_url("ftp://acme.atlassian.net").is_err());
        assert!(check_jira_base_url("mailto:qa@acme.atlassian.net").is_err());
        assert!(check_jira_base_url("https://").is_err());
        assert!(check_jira_base_url("acme.atlassian.net").is_err());
        assert!(check_jira_base_url("https://acme.atlassian.net/").is_ok());
        assert!(check_jira_base_url("http://jira.internal:8080").is_ok());
    }

    #[test]
    fn rejects_unparseable_jira_url() {
        assert!(check_jira_base_url("https://exa mple.atlassian.net").is_err());
        assert!(check_jira_base_url("https://[::1").is_err());
    }

    #[test]
    fn cloud_host_check_reads_the_real_host() {
        for url in [
            "https://evil.example#.atlassian.net",
            "https://evil.example?.atlassian.net",
            "https://user@evil.example/.atlassian.net",
        ] {
            let host = Url::parse(url).unwrap().host_str().unwrap().to_string();
            assert_eq!(host, "evil.example");
            assert!(!is_jira_cloud_host(&host));
            assert!(check_jira_base_url(url).is_ok());
        }
        assert!(is_jira_cloud_host("ACME.Atlassian.net"));
        assert!(is_jira_cloud_host("acme.jira.com"));
    }

    #[cfg(unix)]
    #[test]
    fn saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let stored = StoredConfig {
            jira_token: Some("secret-token".to_string()),
            ..StoredConfig::default()
        };
        stored.save_to(&path).unwrap();
        stored.save_to(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        assert!(StoredConfig::load_from(&path).unwrap().jira_base_url.is_none());

        let stored = StoredConfig {
            jira_base_url: Some("https://acme.atlassian.net".to_string()),
            llm_provider: Some("ollama".to_string()),
            ollama_model: Some("llama3".to_string()),
            ..StoredConfig::default()
        };
        stored.save_to(&path).unwrap();

        let loaded = StoredConfig::load_from(&path).unwrap();
        let config = AppConfig::resolve(loaded, dir.path().to_path_buf()).unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Ollama);
        assert_eq!(config.ollama.model.as_deref(), Some("llama3"));
    }
}
