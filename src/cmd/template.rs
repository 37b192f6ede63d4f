use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::AppResult;
use crate::store::TemplateStore;
use crate::workflow::template::import_template;

#[derive(Args, Debug, Clone)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateCommand {
    /// Import a PDF as a sectioned template.
    Import {
        pdf: PathBuf,
        /// Template name; defaults to the file name without `.pdf`.
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List stored templates, newest first.
    List,
    /// Print a template's content.
    Show { id: String },
    /// Delete an imported template.
    Remove { id: String },
}

pub async fn run(command: TemplateCommand) -> AppResult<()> {
    let config = AppConfig::load()?;
    match command {
        TemplateCommand::Import { pdf, name } => {
            let ctx = AppContext::from_config(config);
            let imported = import_template(&ctx, &pdf, name.as_deref()).await?;
            println!(
                "Imported template {} ({}), {} page(s).",
                imported.template.name, imported.template.id, imported.pages
            );
            println!("\n{}", imported.preview());
        }
        TemplateCommand::List => {
            let store = TemplateStore::load(&config.data_dir)?;
            for template in store.list() {
                let marker = if template.is_default { " (default)" } else { "" };
                println!(
                    "{}  {}{marker}  {}",
                    template.id,
                    template.name,
                    template.created_at.format("%Y-%m-%d")
                );
            }
        }
        TemplateCommand::Show { id } => {
            let store = TemplateStore::load(&config.data_dir)?;
            let template = store.get(&id)?;
            println!("{}\n", template.name);
            println!("{}", template.content);
        }
        TemplateCommand::Remove { id } => {
            let mut store = TemplateStore::load(&config.data_dir)?;
            let removed = store.remove(&id)?;
            store.save()?;
            println!("Deleted template {}.", removed.name);
        }
    }
    Ok(())
}
