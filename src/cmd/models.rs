use crate::config::AppConfig;
use crate::error::AppResult;
use crate::infra::ollama::OllamaClient;

pub async fn run() -> AppResult<()> {
    let config = AppConfig::load()?;
    let ollama = OllamaClient::new(&config.ollama)?;

    let models = ollama.list_models().await;
    if models.is_empty() {
        println!("No models found at {}.", config.ollama.base_url);
        return Ok(());
    }
    let configured = config.ollama.model.as_deref();
    for model in models {
        let marker = if Some(model.as_str()) == configured { " *" } else { "" };
        println!("{model}{marker}");
    }
    Ok(())
}
