use std::io::{self, Write};

use clap::{Args, Subcommand};

use crate::config::{AppConfig, LlmProvider, StoredConfig, config_file_path, is_valid_temperature};
use crate::context::AppContext;
use crate::error::{AppError, AppResult};

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Run the interactive configuration wizard.
    Init,
    /// Show the stored configuration (secrets masked).
    Show,
    /// Check that Jira and the active LLM provider are reachable.
    Test,
}

pub async fn run(command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Init => run_init(),
        ConfigCommand::Show => run_show(),
        ConfigCommand::Test => run_test().await,
    }
}

fn run_init() -> AppResult<()> {
    let mut cfg = StoredConfig::load()?;

    println!("Configuring tplan.");
    println!("Press Enter to keep the current value, '-' to clear it.");
    println!("Secrets are stored in the local config file; protect your filesystem accordingly.");
    println!();

    apply_prompt(
        "Jira base URL (e.g., https://company.atlassian.net)",
        &mut cfg.jira_base_url,
        false,
    )?;
    apply_prompt("Jira username (email)", &mut cfg.jira_username, false)?;
    apply_prompt("Jira API token", &mut cfg.jira_token, true)?;
    apply_prompt(
        "Acceptance criteria field (e.g., customfield_10014)",
        &mut cfg.jira_acceptance_field,
        false,
    )?;

    apply_prompt("LLM provider (groq/ollama)", &mut cfg.llm_provider, false)?;
    if let Some(provider) = cfg.llm_provider.as_deref() {
        provider.parse::<LlmProvider>()?;
    }
    apply_prompt("Groq API key", &mut cfg.groq_api_key, true)?;
    apply_prompt("Groq model", &mut cfg.groq_model, false)?;
    prompt_temperature(&mut cfg.groq_temperature)?;
    apply_prompt("Ollama base URL", &mut cfg.ollama_base_url, false)?;
    apply_prompt("Ollama model", &mut cfg.ollama_model, false)?;

    cfg.save()?;

    let path = config_file_path()?;
    println!("\nConfiguration saved to {}", path.display());
    Ok(())
}

fn run_show() -> AppResult<()> {
    let cfg = StoredConfig::load()?;
    let path = config_file_path()?;

    println!("Configuration file: {}", path.display());
    println!("Jira base URL: {}", display_value(&cfg.jira_base_url));
    println!("Jira username: {}", display_value(&cfg.jira_username));
    println!("Jira API token: {}", mask_secret(&cfg.jira_token));
    println!(
        "Acceptance criteria field: {}",
        display_value(&cfg.jira_acceptance_field)
    );
    println!("LLM provider: {}", display_value(&cfg.llm_provider));
    println!("Groq API key: {}", mask_secret(&cfg.groq_api_key));
    println!("Groq model: {}", display_value(&cfg.groq_model));
    println!(
        "Groq temperature: {}",
        display_value(&cfg.groq_temperature.map(|t| t.to_string()))
    );
    println!("Ollama base URL: {}", display_value(&cfg.ollama_base_url));
    println!("Ollama model: {}", display_value(&cfg.ollama_model));

    Ok(())
}

async fn run_test() -> AppResult<()> {
    let config = AppConfig::load()?;
    let ctx = AppContext::from_config(config);

    println!("Jira: {}", ctx.issue_tracker.test_connection().await);

    let provider = ctx.config.llm_provider;
    match ctx.language_model(None) {
        Ok(model) => println!("{provider}: {}", model.test_connection().await),
        Err(err) => println!("{provider}: [failed] {err}"),
    }
    Ok(())
}

fn prompt_temperature(target: &mut Option<f32>) -> AppResult<()> {
    let current = target.map(|t| t.to_string());
    match prompt("Groq temperature (0-1)", current.as_deref(), false)? {
        PromptAction::Keep => {}
        PromptAction::Clear => *target = None,
        PromptAction::Set(value) => {
            let temperature: f32 = value.parse().map_err(|_| {
                AppError::Configuration(format!("'{value}' is not a number"))
            })?;
            if !is_valid_temperature(temperature) {
                return Err(AppError::Configuration(format!(
                    "temperature {temperature} is outside 0..=1"
                )));
            }
            *target = Some(temperature);
        }
    }
    Ok(())
}

fn apply_prompt(field: &str, target: &mut Option<String>, secret: bool) -> AppResult<()> {
    match prompt(field, target.as_deref(), secret)? {
        PromptAction::Keep => {}
        PromptAction::Clear => *target = None,
        PromptAction::Set(value) => *target = Some(value),
    }
    Ok(())
}

fn prompt(field: &str, current: Option<&str>, secret: bool) -> AppResult<PromptAction> {
    let mut stdout = io::stdout();

    match (current, secret) {
        (Some(_), true) => write!(stdout, "{field} [****] (Enter to keep, '-' to clear): ")?,
        (Some(value), false) => {
            write!(stdout, "{field} [{value}] (Enter to keep, '-' to clear): ")?
        }
        (None, _) => write!(stdout, "{field} (Enter to skip): ")?,
    }
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(parse_answer(&input))
}

fn parse_answer(input: &str) -> PromptAction {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        PromptAction::Keep
    } else if trimmed == "-" {
        PromptAction::Clear
    } else {
        PromptAction::Set(trimmed.to_string())
    }
}

fn display_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn mask_secret(value: &Option<String>) -> String {
    match value {
        Some(token) if token.chars().count() > 6 => {
            let chars: Vec<char> = token.chars().collect();
            let prefix: String = chars[..3].iter().collect();
            let suffix: String = chars[chars.len() - 3..].iter().collect();
            format!("{prefix}***{suffix}")
        }
        Some(token) if !token.is_empty() => "***".to_string(),
        _ => "<not set>".to_string(),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PromptAction {
    Keep,
    Clear,
    Set(String),
}
