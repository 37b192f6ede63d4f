use clap::{Args, Subcommand};

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::domain::ticket::{Ticket, parse_ticket_id};
use crate::error::AppResult;
use crate::store::RecentTickets;
use crate::store::recent::RECENT_PAGE;

#[derive(Args, Debug, Clone)]
pub struct TicketArgs {
    #[command(subcommand)]
    pub command: TicketCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TicketCommand {
    /// Fetch a ticket from Jira and show its normalized fields.
    Fetch {
        /// Ticket key such as QA-123.
        id: String,
    },
    /// List recently fetched tickets.
    Recent,
}

pub async fn run(command: TicketCommand) -> AppResult<()> {
    let config = AppConfig::load()?;
    match command {
        TicketCommand::Fetch { id } => {
            let id = parse_ticket_id(&id)?;
            config.warn_missing();
            let ctx = AppContext::from_config(config);
            let ticket = ctx.issue_tracker.fetch_ticket(&id).await?;

            let mut recent = RecentTickets::load(&ctx.config.data_dir)?;
            recent.record(&ticket);
            recent.save()?;

            print_ticket(&ticket);
            Ok(())
        }
        TicketCommand::Recent => {
            let recent = RecentTickets::load(&config.data_dir)?;
            let tickets = recent.recent(RECENT_PAGE);
            if tickets.is_empty() {
                println!("No tickets fetched yet.");
            }
            for entry in tickets {
                println!(
                    "{}  {}  ({})",
                    entry.ticket.key,
                    entry.ticket.summary,
                    entry.fetched_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
    }
}

fn print_ticket(ticket: &Ticket) {
    println!("{} - {}", ticket.key, ticket.summary);
    println!("Status: {}  Priority: {}", ticket.status, ticket.priority);
    if let Some(assignee) = &ticket.assignee {
        println!("Assignee: {assignee}");
    }
    if !ticket.labels.is_empty() {
        let labels: Vec<&str> = ticket.labels.iter().map(String::as_str).collect();
        println!("Labels: {}", labels.join(", "));
    }
    if !ticket.description.is_empty() {
        println!("\nDescription:\n{}", ticket.description);
    }
    let criteria = if ticket.acceptance_criteria.is_empty() {
        "Not specified"
    } else {
        ticket.acceptance_criteria.as_str()
    };
    println!("\nAcceptance criteria:\n{criteria}");
}
