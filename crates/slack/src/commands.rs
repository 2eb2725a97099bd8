use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::events::EventContext;

pub const EMPTY_ASK_USAGE: &str = "Please provide a question. Example: `/ngrok-ask What is ngrok?`";
pub const EMPTY_YAML_USAGE: &str =
    "Please describe what you need. Example: `/ngrok-yaml rate limit API to 100 requests per minute`";

/// Slash command invocation, as delivered over Socket Mode or the HTTP form post.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocsCommand {
    Ask { question: String },
    Yaml { request: String },
    Help,
    Ticket,
}

impl DocsCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ask { .. } => "/ngrok-ask",
            Self::Yaml { .. } => "/ngrok-yaml",
            Self::Help => "/ngrok-help",
            Self::Ticket => "/ngrok-ticket",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub fn parse_docs_command(payload: &SlashCommandPayload) -> Result<DocsCommand, CommandParseError> {
    let text = payload.text.trim().to_owned();
    match payload.command.trim() {
        "/ngrok-ask" => Ok(DocsCommand::Ask { question: text }),
        "/ngrok-yaml" => Ok(DocsCommand::Yaml { request: text }),
        "/ngrok-help" => Ok(DocsCommand::Help),
        "/ngrok-ticket" => Ok(DocsCommand::Ticket),
        other => Err(CommandParseError::UnsupportedCommand(other.to_owned())),
    }
}

#[async_trait]
pub trait DocsCommandService: Send + Sync {
    async fn ask(
        &self,
        question: &str,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError>;

    async fn yaml(
        &self,
        request: &str,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError>;

    async fn help(&self, payload: &SlashCommandPayload) -> Result<(), CommandRouteError>;

    async fn open_ticket_form(
        &self,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError>;

    /// Posts a plain usage hint back to the invoking channel.
    async fn usage(
        &self,
        message: &str,
        payload: &SlashCommandPayload,
    ) -> Result<(), CommandRouteError>;
}

pub struct CommandRouter<S: ?Sized> {
    service: Arc<S>,
}

impl<S> CommandRouter<S>
where
    S: DocsCommandService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        command: DocsCommand,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        match command {
            DocsCommand::Ask { question } if question.is_empty() => {
                self.service.usage(EMPTY_ASK_USAGE, payload).await
            }
            DocsCommand::Ask { question } => self.service.ask(&question, payload, ctx).await,
            DocsCommand::Yaml { request } if request.is_empty() => {
                self.service.usage(EMPTY_YAML_USAGE, payload).await
            }
            DocsCommand::Yaml { request } => self.service.yaml(&request, payload, ctx).await,
            DocsCommand::Help => self.service.help(payload).await,
            DocsCommand::Ticket => self.service.open_ticket_form(payload, ctx).await,
        }
    }
}
