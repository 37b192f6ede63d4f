use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use crate::config::{AppConfig, LlmProvider};
use crate::context::AppContext;
use crate::domain::document::render;
use crate::error::{AppError, AppResult};
use crate::infra::wordml;
use crate::store::HistoryStore;
use crate::store::history::HISTORY_PAGE;
use crate::workflow::testplan::{PlanRequest, generate_test_plan};

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(subcommand)]
    pub command: PlanCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PlanCommand {
    /// Generate a test plan for a ticket.
    Generate {
        /// Ticket key such as QA-123.
        ticket: String,
        /// Template id; the default template when omitted.
        #[arg(short, long)]
        template: Option<String>,
        /// Override the configured provider (groq or ollama).
        #[arg(short, long)]
        provider: Option<String>,
        /// Print the plan as it is generated.
        #[arg(short, long)]
        stream: bool,
        /// Also write the plan as a Word document (.docx).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show recent generations.
    History,
    /// Print a previously generated plan.
    Show { id: u64 },
    /// Convert a markdown plan into a Word document.
    Export {
        markdown: PathBuf,
        /// Output path; `.docx` is appended when it has no extension.
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub async fn run(command: PlanCommand) -> AppResult<()> {
    match command {
        PlanCommand::Generate {
            ticket,
            template,
            provider,
            stream,
            output,
        } => {
            let provider = provider
                .as_deref()
                .map(str::parse::<LlmProvider>)
                .transpose()?;
            let config = AppConfig::load()?;
            config.warn_missing();
            let ctx = AppContext::from_config(config);

            let mut stdout = io::stdout();
            let request = PlanRequest {
                ticket_id: &ticket,
                template_id: template.as_deref(),
                provider,
                stream,
            };
            let outcome = generate_test_plan(&ctx, request, |chunk| {
                stdout.write_all(chunk.as_bytes())?;
                stdout.flush()?;
                Ok(())
            })
            .await?;

            if stream {
                println!();
            } else {
                println!("{}", outcome.content);
            }
            eprintln!(
                "Generated plan for {} with {} using '{}'.",
                outcome.ticket.key, outcome.provider, outcome.template.name
            );

            if let Some(path) = output {
                export(&outcome.content, &path)?;
            }
            Ok(())
        }
        PlanCommand::History => {
            let config = AppConfig::load()?;
            let history = HistoryStore::load(&config.data_dir)?;
            let entries = history.recent(HISTORY_PAGE);
            if entries.is_empty() {
                println!("No test plans generated yet.");
            }
            for entry in entries {
                println!(
                    "#{}  {}  {}  {}  {}",
                    entry.id,
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.ticket_id,
                    entry.provider,
                    entry.template_name
                );
            }
            Ok(())
        }
        PlanCommand::Show { id } => {
            let config = AppConfig::load()?;
            let history = HistoryStore::load(&config.data_dir)?;
            let entry = history
                .get(id)
                .ok_or_else(|| AppError::NotFound(format!("history entry {id} not found")))?;
            println!("{}", entry.generated_content);
            Ok(())
        }
        PlanCommand::Export { markdown, output } => {
            let content = fs::read_to_string(&markdown)?;
            export(&content, &output)
        }
    }
}

fn export(markdown: &str, path: &Path) -> AppResult<()> {
    let document = render(markdown);
    if document.is_empty() {
        return Err(AppError::Export("nothing to export".to_string()));
    }
    let path = docx_path(path);
    wordml::save(&document, &path)?;
    eprintln!("Saved {}", path.display());
    Ok(())
}

fn docx_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension("docx")
    }
}
