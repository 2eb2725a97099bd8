use std::sync::Arc;

use async_trait::async_trait;
use docbot_agent::conversation::ThreadTranscript;
use docbot_agent::prompts::LLM_REQUIRED_MESSAGE;
use docbot_agent::runtime::{AssistantError, DocsAssistant};
use docbot_core::errors::DomainError;
use docbot_core::support::{
    slack_submission_footer, SupportTicket, TicketDraft, TicketPriority, TicketReceipt,
};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::api::{BotIdentity, OutgoingMessage, SlackApi, SlackApiError, THREAD_HISTORY_LIMIT};
use crate::blocks::{
    answer_message, greeting_message, help_message, ticket_created_text, ticket_failed_text,
    ticket_modal, TicketButtonValue, TicketModalState, CREATE_TICKET_ACTION_ID,
    DESCRIPTION_ACTION_ID, DESCRIPTION_BLOCK_ID, EMAIL_ACTION_ID, EMAIL_BLOCK_ID,
    PRIORITY_ACTION_ID, PRIORITY_BLOCK_ID, SUBJECT_ACTION_ID, SUBJECT_BLOCK_ID,
    TICKET_CALLBACK_ID,
};
use crate::commands::{CommandRouteError, DocsCommandService, SlashCommandPayload};
use crate::events::{
    BlockActionEvent, ConversationService, EventContext, EventHandlerError, HandlerResult,
    InteractionService, MentionEvent, MessageEvent, ViewSubmissionEvent,
};

pub const SEARCHING_TEXT: &str = "🔍 Searching ngrok documentation...";

/// The assistant operations Slack handlers need.
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn ask(
        &self,
        question: &str,
        thread_context: Option<&str>,
    ) -> Result<String, AssistantError>;

    async fn generate_yaml(&self, request: &str) -> Result<String, AssistantError>;

    async fn synthesize_ticket(&self, transcript: &str) -> TicketDraft;
}

#[async_trait]
impl AssistantService for DocsAssistant {
    async fn ask(
        &self,
        question: &str,
        thread_context: Option<&str>,
    ) -> Result<String, AssistantError> {
        DocsAssistant::ask(self, question, thread_context).await
    }

    async fn generate_yaml(&self, request: &str) -> Result<String, AssistantError> {
        DocsAssistant::generate_yaml(self, request).await
    }

    async fn synthesize_ticket(&self, transcript: &str) -> TicketDraft {
        DocsAssistant::synthesize_ticket(self, transcript).await
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("Support ticketing is not configured. Set ZENDESK_SUBDOMAIN, ZENDESK_EMAIL and ZENDESK_API_TOKEN.")]
    NotConfigured,
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("ticketing request failed: {0}")]
    Request(String),
}

/// Files support tickets on behalf of Slack users.
#[async_trait]
pub trait SupportTicketService: Send + Sync {
    async fn create_ticket(&self, ticket: SupportTicket) -> Result<TicketReceipt, TicketError>;
}

#[derive(Debug, Error)]
enum FlowError {
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error("invalid button payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Slack-facing behaviour of the docs bot: slash commands, conversations and
/// the support-ticket modal.
pub struct DocsBot {
    api: Arc<dyn SlackApi>,
    assistant: Arc<dyn AssistantService>,
    tickets: Option<Arc<dyn SupportTicketService>>,
    ticket_tags: Vec<String>,
    identity: OnceCell<BotIdentity>,
}

impl DocsBot {
    pub fn new(api: Arc<dyn SlackApi>, assistant: Arc<dyn AssistantService>) -> Self {
        Self { api, assistant, tickets: None, ticket_tags: Vec::new(), identity: OnceCell::new() }
    }

    pub fn with_tickets(
        mut self,
        tickets: Arc<dyn SupportTicketService>,
        tags: Vec<String>,
    ) -> Self {
        self.tickets = Some(tickets);
        self.ticket_tags = tags;
        self
    }

    async fn bot_identity(&self) -> Result<&BotIdentity, SlackApiError> {
        self.identity.get_or_try_init(|| self.api.auth_test()).await
    }

    /// Profile email, or empty when Slack will not share it.
    async fn user_email(&self, user_id: &str) -> String {
        match self.api.user_info(user_id).await {
            Ok(user) => user.email.unwrap_or_default(),
            Err(error) => {
                warn!(event_name = "slack.user.lookup_failed", user_id, error = %error, "could not read user email");
                String::new()
            }
        }
    }

    /// Rendered thread transcript; `None` when the thread is empty or unreadable.
    async fn thread_context(&self, channel: &str, thread_ts: &str) -> Option<String> {
        match self.api.conversation_replies(channel, thread_ts, THREAD_HISTORY_LIMIT).await {
            Ok(messages) => {
                let rendered = ThreadTranscript::new(messages).render();
                (!rendered.is_empty()).then_some(rendered)
            }
            Err(error) => {
                warn!(
                    event_name = "slack.thread.fetch_failed",
                    channel_id = channel,
                    thread_ts,
                    error = %error,
                    "could not load thread messages"
                );
                None
            }
        }
    }

    async fn bot_in_thread(&self, channel: &str, thread_ts: &str) -> Result<bool, SlackApiError> {
        let messages =
            self.api.conversation_replies(channel, thread_ts, THREAD_HISTORY_LIMIT).await?;
        let identity = self.bot_identity().await?;
        Ok(ThreadTranscript::new(messages).bot_participated(Some(&identity.user_id)))
    }

    fn failure_text(error: AssistantError, ctx: &EventContext) -> String {
        match error {
            AssistantError::LlmRequired => LLM_REQUIRED_MESSAGE.to_owned(),
            other => {
                let interface = other.into_application().into_interface(&ctx.correlation_id);
                format!("{} (ref: `{}`)", interface.user_message(), interface.correlation_id())
            }
        }
    }

    async fn ask_and_respond(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        query: &str,
        searching_text: &str,
        thread_context: Option<&str>,
        ctx: &EventContext,
    ) -> Result<(), SlackApiError> {
        self.api.post_message(OutgoingMessage::text(channel, searching_text).in_thread(thread_ts)).await?;

        let reply = match self.assistant.ask(query, thread_context).await {
            Ok(answer) => {
                let button = thread_context.is_none().then(|| TicketButtonValue {
                    channel: channel.to_owned(),
                    thread_ts: thread_ts.unwrap_or_default().to_owned(),
                });
                info!(
                    event_name = "slack.answer.posted",
                    correlation_id = %ctx.correlation_id,
                    channel_id = channel,
                    thread_ts = thread_ts.unwrap_or_default(),
                    follow_up = thread_context.is_some(),
                    "answer ready"
                );
                OutgoingMessage::from_template(channel, answer_message(&answer, button.as_ref()))
            }
            Err(error) => {
                warn!(
                    event_name = "slack.answer.failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = channel,
                    error = %error,
                    "assistant could not answer"
                );
                OutgoingMessage::text(
                    channel,
                    format!("Sorry, I encountered an issue: {}", Self::failure_text(error, ctx)),
                )
            }
        };
        self.api.post_message(reply.in_thread(thread_ts)).await?;
        Ok(())
    }

    async fn open_ticket_from_conversation(&self, event: &BlockActionEvent) -> Result<(), FlowError> {
        let email = self.user_email(&event.user_id).await;
        let view_id =
            self.api.views_open(&event.trigger_id, &ticket_modal(&TicketModalState::loading(&email))).await?;

        let button: TicketButtonValue = serde_json::from_str(event.value.as_deref().unwrap_or("{}"))?;
        let context = if button.channel.is_empty() || button.thread_ts.is_empty() {
            None
        } else {
            self.thread_context(&button.channel, &button.thread_ts).await
        };
        let draft = match context {
            Some(transcript) => self.assistant.synthesize_ticket(&transcript).await,
            None => TicketDraft::default(),
        };

        let state = TicketModalState {
            subject: draft.subject,
            description: draft.description,
            email,
            loading: false,
        };
        self.api.views_update(&view_id, &ticket_modal(&state)).await?;
        Ok(())
    }

    async fn submit_ticket(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<(), FlowError> {
        let field = |block: &str, action: &str| event.text_value(block, action).unwrap_or_default().to_owned();
        let subject = field(SUBJECT_BLOCK_ID, SUBJECT_ACTION_ID);
        let description = field(DESCRIPTION_BLOCK_ID, DESCRIPTION_ACTION_ID);
        let email = field(EMAIL_BLOCK_ID, EMAIL_ACTION_ID);
        let priority = event
            .selected_option(PRIORITY_BLOCK_ID, PRIORITY_ACTION_ID)
            .and_then(|value| value.parse::<TicketPriority>().ok())
            .unwrap_or_default();

        let user = self.api.user_info(&event.user_id).await?;
        let submitter = user.display_name().to_owned();
        let ticket = SupportTicket {
            subject: subject.clone(),
            description: slack_submission_footer(&description, &submitter),
            requester_name: Some(submitter),
            requester_email: (!email.is_empty()).then(|| email.clone()),
            priority,
            tags: self.ticket_tags.clone(),
        };

        let text = match self.file_ticket(ticket).await {
            Ok(receipt) => {
                info!(
                    event_name = "slack.ticket.created",
                    correlation_id = %ctx.correlation_id,
                    ticket_id = receipt.id,
                    priority = priority.as_str(),
                    "support ticket filed"
                );
                ticket_created_text(receipt.id, &subject, priority, &email)
            }
            Err(error) => {
                warn!(
                    event_name = "slack.ticket.failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "support ticket rejected"
                );
                ticket_failed_text(&error.to_string())
            }
        };
        self.api.post_message(OutgoingMessage::text(&event.user_id, text)).await?;
        Ok(())
    }

    async fn file_ticket(&self, ticket: SupportTicket) -> Result<TicketReceipt, TicketError> {
        let Some(tickets) = &self.tickets else {
            return Err(TicketError::NotConfigured);
        };
        ticket.validate()?;
        tickets.create_ticket(ticket).await
    }
}

fn route_error(error: SlackApiError) -> CommandRouteError {
    CommandRouteError::Service(error.to_string())
}

#[async_trait]
impl DocsCommandService for DocsBot {
    async fn ask(
        &self,
        question: &str,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        let searching = format!("🔍 Searching for: _{question}_");
        self.ask_and_respond(&payload.channel_id, None, question, &searching, None, ctx)
            .await
            .map_err(route_error)
    }

    async fn yaml(
        &self,
        request: &str,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        let channel = payload.channel_id.as_str();
        self.api
            .post_message(OutgoingMessage::text(
                channel,
                format!("⚙️ Generating YAML configuration for: _{request}_"),
            ))
            .await
            .map_err(route_error)?;

        let reply = match self.assistant.generate_yaml(request).await {
            Ok(yaml) => OutgoingMessage::from_template(channel, answer_message(&yaml, None)),
            Err(error) => {
                warn!(
                    event_name = "slack.yaml.failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = channel,
                    error = %error,
                    "yaml generation failed"
                );
                OutgoingMessage::text(
                    channel,
                    format!(
                        "Sorry, I couldn't generate that configuration: {}",
                        Self::failure_text(error, ctx)
                    ),
                )
            }
        };
        self.api.post_message(reply).await.map_err(route_error)?;
        Ok(())
    }

    async fn help(&self, payload: &SlashCommandPayload) -> Result<(), CommandRouteError> {
        self.api
            .post_message(OutgoingMessage::from_template(&payload.channel_id, help_message()))
            .await
            .map_err(route_error)?;
        Ok(())
    }

    async fn open_ticket_form(
        &self,
        payload: &SlashCommandPayload,
        _ctx: &EventContext,
    ) -> Result<(), CommandRouteError> {
        let email = self.user_email(&payload.user_id).await;
        let state = TicketModalState { email, ..TicketModalState::default() };
        self.api.views_open(&payload.trigger_id, &ticket_modal(&state)).await.map_err(route_error)?;
        Ok(())
    }

    async fn usage(
        &self,
        message: &str,
        payload: &SlashCommandPayload,
    ) -> Result<(), CommandRouteError> {
        self.api
            .post_message(OutgoingMessage::text(&payload.channel_id, message))
            .await
            .map_err(route_error)?;
        Ok(())
    }
}

fn conversation_error(error: SlackApiError) -> EventHandlerError {
    EventHandlerError::Conversation(error.to_string())
}

#[async_trait]
impl ConversationService for DocsBot {
    async fn handle_mention(
        &self,
        event: &MentionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let query = event.query();
        if query.is_empty() {
            self.api
                .post_message(OutgoingMessage::from_template(
                    &event.channel_id,
                    greeting_message(&event.user_id),
                ))
                .await
                .map_err(conversation_error)?;
            return Ok(HandlerResult::Processed);
        }

        info!(
            event_name = "slack.mention.received",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            thread_ts = event.reply_thread(),
            "answering mention"
        );
        let context = match event.existing_thread() {
            Some(thread_ts) => self.thread_context(&event.channel_id, thread_ts).await,
            None => None,
        };
        self.ask_and_respond(
            &event.channel_id,
            Some(event.reply_thread()),
            query,
            SEARCHING_TEXT,
            context.as_deref(),
            ctx,
        )
        .await
        .map_err(conversation_error)?;
        Ok(HandlerResult::Processed)
    }

    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if event.subtype.is_some() || event.bot_id.is_some() || event.starts_with_mention() {
            return Ok(HandlerResult::Ignored);
        }

        let is_dm = event.is_direct_message();
        let thread_reply_of = event.thread_reply_of();
        if !is_dm && thread_reply_of.is_none() {
            return Ok(HandlerResult::Ignored);
        }

        if let (false, Some(thread_ts)) = (is_dm, thread_reply_of) {
            match self.bot_in_thread(&event.channel_id, thread_ts).await {
                Ok(true) => {}
                Ok(false) => return Ok(HandlerResult::Ignored),
                Err(error) => {
                    warn!(
                        event_name = "slack.thread.participation_check_failed",
                        correlation_id = %ctx.correlation_id,
                        channel_id = %event.channel_id,
                        thread_ts,
                        error = %error,
                        "skipping thread reply"
                    );
                    return Ok(HandlerResult::Ignored);
                }
            }
        }

        let text = event.text.trim();
        if text.is_empty() {
            return Ok(HandlerResult::Ignored);
        }

        let context = match thread_reply_of {
            Some(thread_ts) => self.thread_context(&event.channel_id, thread_ts).await,
            None => None,
        };
        self.ask_and_respond(
            &event.channel_id,
            event.thread_ts.as_deref(),
            text,
            SEARCHING_TEXT,
            context.as_deref(),
            ctx,
        )
        .await
        .map_err(conversation_error)?;
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl InteractionService for DocsBot {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if event.action_id != CREATE_TICKET_ACTION_ID {
            return Ok(HandlerResult::Ignored);
        }

        if let Err(error) = self.open_ticket_from_conversation(event).await {
            warn!(
                event_name = "slack.ticket.form_failed",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "could not open ticket form"
            );
            self.api
                .post_message(OutgoingMessage::text(
                    &event.user_id,
                    format!("❌ Sorry, there was an error opening the ticket form: {error}"),
                ))
                .await
                .map_err(|error| EventHandlerError::Interaction(error.to_string()))?;
        }
        Ok(HandlerResult::Processed)
    }

    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if event.callback_id != TICKET_CALLBACK_ID {
            return Ok(HandlerResult::Ignored);
        }

        if let Err(error) = self.submit_ticket(event, ctx).await {
            warn!(
                event_name = "slack.ticket.submission_failed",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "ticket submission failed"
            );
            self.api
                .post_message(OutgoingMessage::text(
                    &event.user_id,
                    format!("❌ Sorry, there was an error creating your ticket: {error}"),
                ))
                .await
                .map_err(|error| EventHandlerError::Interaction(error.to_string()))?;
        }
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use docbot_agent::conversation::ThreadMessage;
    use docbot_agent::retrieval::RetrievalError;
    use docbot_agent::runtime::AssistantError;
    use docbot_core::support::{SupportTicket, TicketDraft, TicketPriority, TicketReceipt};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::{AssistantService, DocsBot, SupportTicketService, TicketError};
    use crate::api::{BotIdentity, OutgoingMessage, SlackApi, SlackApiError, SlackUser};
    use crate::blocks::{ActionElement, Block, ModalView, CREATE_TICKET_ACTION_ID};
    use crate::commands::{DocsCommandService, SlashCommandPayload};
    use crate::events::{
        BlockActionEvent, ConversationService, EventContext, HandlerResult, InteractionService,
        MentionEvent, MessageEvent, ViewSubmissionEvent,
    };

    #[derive(Default)]
    struct FakeSlack {
        posted: Mutex<Vec<OutgoingMessage>>,
        opened: Mutex<Vec<ModalView>>,
        updated: Mutex<Vec<(String, ModalView)>>,
        replies: Vec<ThreadMessage>,
    }

    impl FakeSlack {
        fn with_replies(replies: Vec<ThreadMessage>) -> Self {
            Self { replies, ..Self::default() }
        }

        async fn texts(&self) -> Vec<String> {
            self.posted.lock().await.iter().map(|message| message.text.clone()).collect()
        }
    }

    #[async_trait]
    impl SlackApi for FakeSlack {
        async fn post_message(&self, message: OutgoingMessage) -> Result<String, SlackApiError> {
            self.posted.lock().await.push(message);
            Ok("100.1".to_owned())
        }

        async fn conversation_replies(
            &self,
            _channel: &str,
            _thread_ts: &str,
            _limit: u32,
        ) -> Result<Vec<ThreadMessage>, SlackApiError> {
            Ok(self.replies.clone())
        }

        async fn auth_test(&self) -> Result<BotIdentity, SlackApiError> {
            Ok(BotIdentity { user_id: "UBOT".to_owned(), ..BotIdentity::default() })
        }

        async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
            Ok(SlackUser {
                id: user_id.to_owned(),
                name: "dev".to_owned(),
                real_name: Some("Dev Eloper".to_owned()),
                email: Some("dev@example.com".to_owned()),
            })
        }

        async fn views_open(
            &self,
            _trigger_id: &str,
            view: &ModalView,
        ) -> Result<String, SlackApiError> {
            self.opened.lock().await.push(view.clone());
            Ok("V1".to_owned())
        }

        async fn views_update(&self, view_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
            self.updated.lock().await.push((view_id.to_owned(), view.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAssistant {
        fail: bool,
        contexts: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl AssistantService for FakeAssistant {
        async fn ask(
            &self,
            question: &str,
            thread_context: Option<&str>,
        ) -> Result<String, AssistantError> {
            self.contexts.lock().await.push(thread_context.map(str::to_owned));
            if self.fail {
                return Err(AssistantError::Retrieval(RetrievalError::VectorStore(
                    "connection refused".to_owned(),
                )));
            }
            Ok(format!("Answer to {question}"))
        }

        async fn generate_yaml(&self, _request: &str) -> Result<String, AssistantError> {
            Err(AssistantError::LlmRequired)
        }

        async fn synthesize_ticket(&self, transcript: &str) -> TicketDraft {
            TicketDraft { subject: "Tunnel drops".to_owned(), description: transcript.to_owned() }
        }
    }

    #[derive(Default)]
    struct FakeTickets {
        filed: Mutex<Vec<SupportTicket>>,
    }

    #[async_trait]
    impl SupportTicketService for FakeTickets {
        async fn create_ticket(&self, ticket: SupportTicket) -> Result<TicketReceipt, TicketError> {
            self.filed.lock().await.push(ticket);
            Ok(TicketReceipt { id: 4242, url: "https://acme.zendesk.com/agent/tickets/4242".to_owned() })
        }
    }

    fn bot(slack: Arc<FakeSlack>, assistant: Arc<FakeAssistant>) -> DocsBot {
        DocsBot::new(slack, assistant)
    }

    fn ctx() -> EventContext {
        EventContext { correlation_id: "env-9".to_owned() }
    }

    fn slash(command: &str, text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: command.to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_id: "trig-1".to_owned(),
        }
    }

    fn has_ticket_button(message: &OutgoingMessage) -> bool {
        message.blocks.iter().any(|block| {
            matches!(block, Block::Actions { elements, .. }
                if matches!(elements.first(), Some(ActionElement::Button(button)) if button.action_id == CREATE_TICKET_ACTION_ID))
        })
    }

    #[tokio::test]
    async fn slash_ask_posts_progress_then_answer_with_ticket_button() {
        let slack = Arc::new(FakeSlack::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));

        bot.ask("What is ngrok?", &slash("/ngrok-ask", "What is ngrok?"), &ctx())
            .await
            .expect("ask succeeds");

        let posted = slack.posted.lock().await;
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].text, "🔍 Searching for: _What is ngrok?_");
        assert_eq!(posted[1].text, "Answer to What is ngrok?");
        assert!(has_ticket_button(&posted[1]));
        assert_eq!(posted[1].thread_ts, None);
    }

    #[tokio::test]
    async fn assistant_failures_post_safe_message_with_reference() {
        let slack = Arc::new(FakeSlack::default());
        let assistant = Arc::new(FakeAssistant { fail: true, ..FakeAssistant::default() });
        let bot = bot(slack.clone(), assistant);

        bot.ask("oauth", &slash("/ngrok-ask", "oauth"), &ctx()).await.expect("ask handled");

        let texts = slack.texts().await;
        assert_eq!(
            texts[1],
            "Sorry, I encountered an issue: The documentation service is temporarily unavailable. Please retry shortly. (ref: `env-9`)"
        );
        assert!(!texts[1].contains("connection refused"));
    }

    #[tokio::test]
    async fn yaml_without_llm_reports_missing_key() {
        let slack = Arc::new(FakeSlack::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));

        bot.yaml("rate limit", &slash("/ngrok-yaml", "rate limit"), &ctx()).await.expect("yaml handled");

        assert_eq!(
            slack.texts().await,
            vec![
                "⚙️ Generating YAML configuration for: _rate limit_".to_owned(),
                "Sorry, I couldn't generate that configuration: OpenAI API key required for YAML generation."
                    .to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn ticket_command_opens_modal_prefilled_with_profile_email() {
        let slack = Arc::new(FakeSlack::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));

        bot.open_ticket_form(&slash("/ngrok-ticket", ""), &ctx()).await.expect("modal opens");

        let opened = slack.opened.lock().await;
        let json = serde_json::to_value(&opened[0]).expect("modal serializes");
        assert_eq!(json["callback_id"], "ticket_submission");
        assert_eq!(json["blocks"][2]["element"]["initial_value"], "dev@example.com");
    }

    #[tokio::test]
    async fn empty_mention_gets_greeting() {
        let slack = Arc::new(FakeSlack::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));
        let mention = MentionEvent {
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            text: "<@UBOT>".to_owned(),
            ts: "1.0".to_owned(),
            thread_ts: None,
        };

        let result = bot.handle_mention(&mention, &ctx()).await.expect("mention handled");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(slack.texts().await, vec!["Hi! Ask me anything about ngrok!".to_owned()]);
    }

    #[tokio::test]
    async fn mention_inside_thread_uses_transcript_and_skips_button() {
        let slack = Arc::new(FakeSlack::with_replies(vec![
            ThreadMessage::from_user("U1", "My tunnel drops"),
            ThreadMessage::from_bot("B1", "Try reconnecting"),
        ]));
        let assistant = Arc::new(FakeAssistant::default());
        let bot = bot(slack.clone(), assistant.clone());
        let mention = MentionEvent {
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            text: "<@UBOT> still failing".to_owned(),
            ts: "2.0".to_owned(),
            thread_ts: Some("1.0".to_owned()),
        };

        bot.handle_mention(&mention, &ctx()).await.expect("mention handled");

        let contexts = assistant.contexts.lock().await;
        assert_eq!(
            contexts[0].as_deref(),
            Some("User (U1): My tunnel drops\n\nBot: Try reconnecting")
        );
        let posted = slack.posted.lock().await;
        assert_eq!(posted[0].text, "🔍 Searching ngrok documentation...");
        assert!(posted.iter().all(|message| message.thread_ts.as_deref() == Some("1.0")));
        assert!(!has_ticket_button(&posted[1]));
    }

    fn channel_reply(text: &str) -> MessageEvent {
        MessageEvent {
            channel_id: "C1".to_owned(),
            channel_type: Some("channel".to_owned()),
            user_id: Some("U1".to_owned()),
            text: text.to_owned(),
            ts: "3.0".to_owned(),
            thread_ts: Some("1.0".to_owned()),
            ..MessageEvent::default()
        }
    }

    #[tokio::test]
    async fn channel_thread_replies_need_bot_participation() {
        let quiet = Arc::new(FakeSlack::with_replies(vec![ThreadMessage::from_user("U1", "hi")]));
        let result = bot(quiet.clone(), Arc::new(FakeAssistant::default()))
            .handle_message(&channel_reply("any ideas?"), &ctx())
            .await
            .expect("message handled");
        assert_eq!(result, HandlerResult::Ignored);
        assert!(quiet.posted.lock().await.is_empty());

        let joined = Arc::new(FakeSlack::with_replies(vec![
            ThreadMessage::from_user("U1", "hi"),
            ThreadMessage::from_user("UBOT", "hello"),
        ]));
        let result = bot(joined.clone(), Arc::new(FakeAssistant::default()))
            .handle_message(&channel_reply("any ideas?"), &ctx())
            .await
            .expect("message handled");
        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(joined.texts().await[1], "Answer to any ideas?");
    }

    #[tokio::test]
    async fn message_filters_skip_noise() {
        let slack = Arc::new(FakeSlack::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));
        let dm = MessageEvent {
            channel_id: "D1".to_owned(),
            channel_type: Some("im".to_owned()),
            user_id: Some("U1".to_owned()),
            text: "hello".to_owned(),
            ts: "1.0".to_owned(),
            ..MessageEvent::default()
        };

        let skipped = [
            MessageEvent { subtype: Some("message_changed".to_owned()), ..dm.clone() },
            MessageEvent { bot_id: Some("B1".to_owned()), ..dm.clone() },
            MessageEvent { text: "<@UBOT> hello".to_owned(), ..dm.clone() },
            MessageEvent { text: "   ".to_owned(), ..dm.clone() },
            MessageEvent { channel_type: Some("channel".to_owned()), ..dm.clone() },
        ];
        for event in skipped {
            let result = bot.handle_message(&event, &ctx()).await.expect("message handled");
            assert_eq!(result, HandlerResult::Ignored);
        }
        assert!(slack.posted.lock().await.is_empty());

        let result = bot.handle_message(&dm, &ctx()).await.expect("dm handled");
        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(slack.texts().await, vec!["🔍 Searching ngrok documentation...", "Answer to hello"]);
    }

    #[tokio::test]
    async fn ticket_button_opens_loading_modal_then_prefills_draft() {
        let slack = Arc::new(FakeSlack::with_replies(vec![ThreadMessage::from_user(
            "U1",
            "My tunnel drops",
        )]));
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));
        let action = BlockActionEvent {
            user_id: "U1".to_owned(),
            trigger_id: "trig-2".to_owned(),
            action_id: CREATE_TICKET_ACTION_ID.to_owned(),
            value: Some(json!({"channel": "C1", "thread_ts": "1.0"}).to_string()),
            ..BlockActionEvent::default()
        };

        bot.handle_block_action(&action, &ctx()).await.expect("action handled");

        let opened = serde_json::to_value(&slack.opened.lock().await[0]).expect("serializes");
        assert_eq!(opened["blocks"][0]["elements"][0]["text"], "⏳ *Loading conversation context...*");
        let updated = slack.updated.lock().await;
        assert_eq!(updated[0].0, "V1");
        let prefilled = serde_json::to_value(&updated[0].1).expect("serializes");
        assert_eq!(prefilled["blocks"][1]["element"]["initial_value"], "Tunnel drops");
        assert!(slack.posted.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_button_value_dms_an_error() {
        let slack = Arc::new(FakeSlack::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));
        let action = BlockActionEvent {
            user_id: "U1".to_owned(),
            action_id: CREATE_TICKET_ACTION_ID.to_owned(),
            value: Some("not json".to_owned()),
            ..BlockActionEvent::default()
        };

        bot.handle_block_action(&action, &ctx()).await.expect("action handled");

        let posted = slack.posted.lock().await;
        assert_eq!(posted[0].channel, "U1");
        assert!(posted[0].text.starts_with("❌ Sorry, there was an error opening the ticket form:"));
    }

    fn submission() -> ViewSubmissionEvent {
        ViewSubmissionEvent {
            user_id: "U1".to_owned(),
            view_id: "V1".to_owned(),
            callback_id: "ticket_submission".to_owned(),
            values: json!({
                "subject_block": {"subject": {"value": "Tunnel drops"}},
                "description_block": {"description": {"value": "Every hour"}},
                "email_block": {"email": {"value": "dev@example.com"}},
                "priority_block": {"priority": {"selected_option": {"value": "high"}}}
            }),
        }
    }

    #[tokio::test]
    async fn submission_files_ticket_and_dms_receipt() {
        let slack = Arc::new(FakeSlack::default());
        let tickets = Arc::new(FakeTickets::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()))
            .with_tickets(tickets.clone(), vec!["slack".to_owned(), "ngrok-bot".to_owned()]);

        bot.handle_view_submission(&submission(), &ctx()).await.expect("submission handled");

        let filed = tickets.filed.lock().await;
        assert_eq!(filed[0].description, "Every hour\n\n---\nSubmitted via Slack by Dev Eloper");
        assert_eq!(filed[0].priority, TicketPriority::High);
        assert_eq!(filed[0].tags, vec!["slack", "ngrok-bot"]);
        let posted = slack.posted.lock().await;
        assert_eq!(posted[0].channel, "U1");
        assert!(posted[0].text.contains("*Ticket ID:* #4242"));
        assert!(posted[0].text.contains("*Priority:* High"));
    }

    #[tokio::test]
    async fn submission_without_ticketing_reports_failure() {
        let slack = Arc::new(FakeSlack::default());
        let bot = bot(slack.clone(), Arc::new(FakeAssistant::default()));

        bot.handle_view_submission(&submission(), &ctx()).await.expect("submission handled");

        let texts = slack.texts().await;
        assert!(texts[0].starts_with("❌ *Failed to create ticket*"));
        assert!(texts[0].contains("ZENDESK_SUBDOMAIN"));
    }
}
