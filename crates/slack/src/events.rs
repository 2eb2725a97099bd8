use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::commands::{
    parse_docs_command, CommandParseError, CommandRouteError, CommandRouter, DocsCommandService,
    SlashCommandPayload,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    AppMention(MentionEvent),
    Message(MessageEvent),
    BlockAction(BlockActionEvent),
    ViewSubmission(ViewSubmissionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::Message(_) => SlackEventType::Message,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Events API payload: the `event_callback` body (or Socket Mode
    /// `events_api` payload) carrying an inner `event`.
    pub fn from_events_api(payload: &Value) -> Self {
        let event = payload.get("event").unwrap_or(&Value::Null);
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();
        let parsed = match event_type {
            "app_mention" => MentionEvent::deserialize(event).map(Self::AppMention).ok(),
            "message" => MessageEvent::deserialize(event).map(Self::Message).ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| Self::Unsupported { event_type: event_type.to_owned() })
    }

    /// Interactivity payload: block actions and view submissions.
    pub fn from_interactive(payload: &Value) -> Self {
        let kind = payload.get("type").and_then(Value::as_str).unwrap_or_default();
        let parsed = match kind {
            "block_actions" => BlockActionEvent::from_payload(payload).map(Self::BlockAction),
            "view_submission" => {
                ViewSubmissionEvent::from_payload(payload).map(Self::ViewSubmission)
            }
            _ => None,
        };
        parsed.unwrap_or_else(|| Self::Unsupported { event_type: kind.to_owned() })
    }

    pub fn from_slash_command(payload: &Value) -> Self {
        match SlashCommandPayload::deserialize(payload) {
            Ok(command) => Self::SlashCommand(command),
            Err(_) => Self::Unsupported { event_type: "slash_commands".to_owned() },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    AppMention,
    Message,
    BlockAction,
    ViewSubmission,
    Unsupported,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MentionEvent {
    #[serde(rename = "channel", default)]
    pub channel_id: String,
    #[serde(rename = "user", default)]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl MentionEvent {
    /// Everything after the first `>`, i.e. the text following `<@BOT>`.
    pub fn query(&self) -> &str {
        match self.text.split_once('>') {
            Some((_, rest)) => rest.trim(),
            None => self.text.trim(),
        }
    }

    /// The thread being continued, when the mention is a reply inside one.
    pub fn existing_thread(&self) -> Option<&str> {
        self.thread_ts.as_deref().filter(|thread_ts| *thread_ts != self.ts)
    }

    pub fn reply_thread(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "channel", default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(rename = "user", default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    pub fn is_direct_message(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }

    pub fn thread_reply_of(&self) -> Option<&str> {
        self.thread_ts.as_deref().filter(|thread_ts| *thread_ts != self.ts)
    }

    /// Text that opens with a user mention is handled as an `app_mention`.
    pub fn starts_with_mention(&self) -> bool {
        let Some(rest) = self.text.strip_prefix("<@") else {
            return false;
        };
        let end = rest.find(|ch: char| !(ch.is_alphanumeric() || ch == '_')).unwrap_or(rest.len());
        end > 0 && rest[end..].starts_with('>')
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub user_id: String,
    pub trigger_id: String,
    pub action_id: String,
    pub value: Option<String>,
    pub channel_id: Option<String>,
    pub message_ts: Option<String>,
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

impl BlockActionEvent {
    pub fn from_payload(payload: &Value) -> Option<Self> {
        Some(Self {
            user_id: str_at(payload, "/user/id")?.to_owned(),
            trigger_id: str_at(payload, "/trigger_id").unwrap_or_default().to_owned(),
            action_id: str_at(payload, "/actions/0/action_id")?.to_owned(),
            value: str_at(payload, "/actions/0/value").map(str::to_owned),
            channel_id: str_at(payload, "/channel/id").map(str::to_owned),
            message_ts: str_at(payload, "/container/message_ts").map(str::to_owned),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub view_id: String,
    pub callback_id: String,
    /// `view.state.values`, keyed by block id then action id.
    pub values: Value,
}

impl ViewSubmissionEvent {
    pub fn from_payload(payload: &Value) -> Option<Self> {
        Some(Self {
            user_id: str_at(payload, "/user/id")?.to_owned(),
            view_id: str_at(payload, "/view/id").unwrap_or_default().to_owned(),
            callback_id: str_at(payload, "/view/callback_id")?.to_owned(),
            values: payload.pointer("/view/state/values").cloned().unwrap_or(Value::Null),
        })
    }

    pub fn text_value(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.values.get(block_id)?.get(action_id)?.get("value")?.as_str()
    }

    pub fn selected_option(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.values.get(block_id)?.get(action_id)?.pointer("/selected_option/value")?.as_str()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("conversation handler failure: {0}")]
    Conversation(String),
    #[error("interaction handler failure: {0}")]
    Interaction(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers every handler the docs bot answers, all backed by one service.
pub fn docs_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: DocsCommandService + ConversationService + InteractionService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(service.clone()));
    dispatcher.register(MentionHandler::new(service.clone()));
    dispatcher.register(MessageHandler::new(service.clone()));
    dispatcher.register(BlockActionHandler::new(service.clone()));
    dispatcher.register(ViewSubmissionHandler::new(service));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: DocsCommandService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: DocsCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = parse_docs_command(payload)?;
        self.router.route(command, payload, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn handle_mention(
        &self,
        event: &MentionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct MentionHandler<S> {
    service: Arc<S>,
}

impl<S> MentionHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MentionHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.handle_mention(event, ctx).await
    }
}

pub struct MessageHandler<S> {
    service: Arc<S>,
}

impl<S> MessageHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.handle_message(event, ctx).await
    }
}

#[async_trait]
pub trait InteractionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: Arc<S>,
}

impl<S> BlockActionHandler<S>
where
    S: InteractionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: InteractionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.handle_block_action(event, ctx).await
    }
}

pub struct ViewSubmissionHandler<S> {
    service: Arc<S>,
}

impl<S> ViewSubmissionHandler<S>
where
    S: InteractionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ViewSubmissionHandler<S>
where
    S: InteractionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.handle_view_submission(event, ctx).await
    }
}
