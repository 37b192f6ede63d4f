use tracing::{debug, info};

use crate::config::LlmProvider;
use crate::context::AppContext;
use crate::domain::ticket::{Ticket, parse_ticket_id};
use crate::error::{AppError, AppResult};
use crate::store::history::NewHistoryEntry;
use crate::store::{HistoryStore, RecentTickets, Template, TemplateStore};

pub struct PlanRequest<'a> {
    pub ticket_id: &'a str,
    /// `None` picks the default template.
    pub template_id: Option<&'a str>,
    /// `None` uses the configured provider.
    pub provider: Option<LlmProvider>,
    pub stream: bool,
}

pub struct TestPlanOutcome {
    pub ticket: Ticket,
    pub template: Template,
    pub provider: LlmProvider,
    pub content: String,
    pub history_id: u64,
}

/// Fetches the ticket, runs it through the language model with the chosen
/// template and records the result. When streaming, `sink` sees each chunk
/// as it arrives; otherwise it is never called.
pub async fn generate_test_plan<S>(
    ctx: &AppContext,
    request: PlanRequest<'_>,
    sink: S,
) -> AppResult<TestPlanOutcome>
where
    S: FnMut(&str) -> AppResult<()>,
{
    let ticket_id = parse_ticket_id(request.ticket_id)?;
    let data_dir = &ctx.config.data_dir;

    let templates = TemplateStore::load(data_dir)?;
    let template = match request.template_id {
        Some(id) => templates.get(id)?,
        None => templates.default_template()?,
    };
    if template.content.trim().is_empty() {
        return Err(AppError::Template(format!(
            "template {} has no content",
            template.id
        )));
    }
    let template = template.clone();

    let language_model = ctx.language_model(request.provider)?;
    let provider = language_model.provider();

    let ticket = ctx.issue_tracker.fetch_ticket(&ticket_id).await?;
    debug!(ticket = %ticket.key, "fetched ticket");

    let mut recent = RecentTickets::load(data_dir)?;
    recent.record(&ticket);
    recent.save()?;

    info!(ticket = %ticket.key, template = %template.id, %provider, stream = request.stream, "generating test plan");
    let content = if request.stream {
        language_model
            .stream(&ticket, &template.content)
            .await?
            .forward(sink)
            .await?
    } else {
        language_model.generate(&ticket, &template.content).await?
    };

    let mut history = HistoryStore::load(data_dir)?;
    let history_id = history.append(NewHistoryEntry {
        ticket_id: &ticket.key,
        template_id: &template.id,
        template_name: &template.name,
        provider,
        generated_content: &content,
    });
    history.save()?;

    Ok(TestPlanOutcome {
        ticket,
        template,
        provider,
        content,
        history_id,
    })
}
