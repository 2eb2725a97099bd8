use std::sync::Arc;

use docbot_agent::llm::{llm_from_config, LlmError};
use docbot_agent::retrieval::{retriever_from_config, DocsRetriever, RetrievalError};
use docbot_agent::runtime::DocsAssistant;
use docbot_core::config::{AppConfig, ConfigError};
use docbot_slack::api::{SlackApiError, SlackWebClient};
use docbot_slack::events::{docs_dispatcher, EventDispatcher};
use docbot_slack::handlers::{DocsBot, TicketError};
use thiserror::Error;
use tracing::info;

use crate::zendesk::ZendeskClient;

pub struct Application {
    pub config: AppConfig,
    pub assistant: Arc<DocsAssistant>,
    pub retriever: Arc<dyn DocsRetriever>,
    pub dispatcher: Arc<EventDispatcher>,
    pub slack: SlackWebClient,
    pub tickets: Option<ZendeskClient>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("docs backend setup failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("slack client setup failed: {0}")]
    Slack(#[from] SlackApiError),
    #[error("zendesk client setup failed: {0}")]
    Ticketing(#[from] TicketError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let retriever = retriever_from_config(&config)?;
    info!(
        event_name = "system.bootstrap.docs_backend_ready",
        correlation_id = "bootstrap",
        docs_backend = retriever.backend().as_str(),
        "docs retriever constructed"
    );

    let llm = llm_from_config(&config.llm)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        llm_enabled = llm.is_some(),
        "llm client resolved"
    );

    let assistant = Arc::new(DocsAssistant::from_config(&config, retriever.clone(), llm));
    let slack = SlackWebClient::new(config.slack.bot_token.clone())?;
    let tickets = ZendeskClient::from_config(&config.support)?;
    info!(
        event_name = "system.bootstrap.ticketing_ready",
        correlation_id = "bootstrap",
        ticketing_configured = tickets.is_some(),
        "support ticketing resolved"
    );

    let mut bot = DocsBot::new(Arc::new(slack.clone()), assistant.clone());
    if let Some(client) = &tickets {
        bot = bot.with_tickets(Arc::new(client.clone()), config.support.tags.clone());
    }
    let dispatcher = Arc::new(docs_dispatcher(Arc::new(bot)));
    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        handler_count = dispatcher.handler_count(),
        slack_mode = config.slack.mode.as_str(),
        "application bootstrap complete"
    );

    Ok(Application { config, assistant, retriever, dispatcher, slack, tickets })
}
