use std::sync::OnceLock;

use docbot_core::docs::truncate_chars;
use docbot_core::support::{TicketPriority, DESCRIPTION_MAX_CHARS, SUBJECT_MAX_CHARS};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

pub const SECTION_MAX_CHARS: usize = 2900;
pub const FALLBACK_TEXT_MAX_CHARS: usize = 200;

pub const CREATE_TICKET_ACTION_ID: &str = "create_ticket_from_conversation";
pub const TICKET_CALLBACK_ID: &str = "ticket_submission";
pub const SUBJECT_BLOCK_ID: &str = "subject_block";
pub const SUBJECT_ACTION_ID: &str = "subject";
pub const DESCRIPTION_BLOCK_ID: &str = "description_block";
pub const DESCRIPTION_ACTION_ID: &str = "description";
pub const EMAIL_BLOCK_ID: &str = "email_block";
pub const EMAIL_ACTION_ID: &str = "email";
pub const PRIORITY_BLOCK_ID: &str = "priority_block";
pub const PRIORITY_ACTION_ID: &str = "priority";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), style: None, value: None }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonElement),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        multiline: bool,
    },
    StaticSelect {
        action_id: String,
        placeholder: TextObject,
        options: Vec<SelectOption>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_option: Option<SelectOption>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: TextObject,
    },
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
    },
    Divider {},
    Actions {
        block_id: String,
        elements: Vec<ActionElement>,
    },
    Context {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<TextObject>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: InputElement,
    },
}

impl Block {
    pub fn mrkdwn_section(text: impl Into<String>) -> Self {
        Self::Section { block_id: None, text: TextObject::mrkdwn(text) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: Some(block_id.into()), text: builder.build() });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider {});
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(ActionElement::Button(button));
        self
    }

    fn build(self) -> Vec<ActionElement> {
        self.elements
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "modal")]
pub struct ModalView {
    pub callback_id: String,
    pub title: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<TextObject>,
    pub blocks: Vec<Block>,
}

/// Where the "create ticket" button points back to, carried as the button value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketButtonValue {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub thread_ts: String,
}

fn fence_language() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"```\w+\n").ok()).as_ref()
}

/// Slack code blocks do not render a language hint.
pub fn strip_fence_languages(answer: &str) -> String {
    match fence_language() {
        Some(pattern) => pattern.replace_all(answer, "```\n").into_owned(),
        None => answer.to_string(),
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits an answer into mrkdwn sections under Slack's per-block text limit,
/// preferring paragraph boundaries.
pub fn format_answer_blocks(answer: &str) -> Vec<Block> {
    let answer = strip_fence_languages(answer);
    if char_len(&answer) <= SECTION_MAX_CHARS {
        return vec![Block::mrkdwn_section(answer)];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for part in answer.split("\n\n") {
        if char_len(&current) + char_len(part) + 2 > SECTION_MAX_CHARS {
            if !current.is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = part.to_string();
        } else if current.is_empty() {
            current = part.to_string();
        } else {
            current.push_str("\n\n");
            current.push_str(part);
        }
    }
    if !current.is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
        .iter()
        .flat_map(|chunk| hard_split(chunk, SECTION_MAX_CHARS))
        .filter(|piece| !piece.is_empty())
        .map(Block::mrkdwn_section)
        .collect()
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max_chars).map(|piece| piece.iter().collect()).collect()
}

/// Answer blocks, followed by a ticket button unless the answer continues an
/// existing thread conversation.
pub fn answer_message(answer: &str, ticket_button: Option<&TicketButtonValue>) -> MessageTemplate {
    let builder = MessageBuilder::new(truncate_chars(answer, FALLBACK_TEXT_MAX_CHARS))
        .blocks(format_answer_blocks(answer));
    let Some(button) = ticket_button else {
        return builder.build();
    };

    let value = serde_json::to_string(button).unwrap_or_default();
    builder
        .divider()
        .actions("docs.answer.actions.v1", |actions| {
            actions.button(
                ButtonElement::new(CREATE_TICKET_ACTION_ID, "🎫 Create Support Ticket")
                    .style(ButtonStyle::Primary)
                    .value(value),
            );
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("ngrok Documentation Bot Help")
        .header("🚀 ngrok Documentation Bot Help")
        .section("docs.help.usage.v1", |section| {
            section.mrkdwn(
                "*How to use this bot:*\n\n1. *Mention the bot* - `@ngrok-bot your question`\n2. *Direct message* - Send a DM with your question\n3. *Use slash commands* - Try the commands below",
            );
        })
        .divider()
        .section("docs.help.commands.v1", |section| {
            section.mrkdwn(
                "*Available Commands:*\n\n• `/ngrok-ask <question>` - Ask a question about ngrok\n• `/ngrok-yaml <description>` - Get YAML configuration help\n• `/ngrok-ticket` - Create a support ticket\n• `/ngrok-help` - Show this help message",
            );
        })
        .divider()
        .section("docs.help.examples.v1", |section| {
            section.mrkdwn(
                "*Example Questions:*\n\n• What is ngrok?\n• How do I create an HTTP tunnel?\n• Show me authentication examples\n• How do I use Traffic Policy?\n• What are ngrok endpoints?",
            );
        })
        .build()
}

pub fn greeting_message(user_id: &str) -> MessageTemplate {
    MessageBuilder::new("Hi! Ask me anything about ngrok!")
        .section("docs.greeting.v1", |section| {
            section.mrkdwn(format!(
                "Hi <@{user_id}>! 👋\n\nI'm your ngrok documentation assistant. Ask me anything about ngrok!\n\n*Examples:*\n• What is ngrok?\n• How do I create an HTTP tunnel?\n• Show me authentication examples\n• How do I configure Traffic Policy?"
            ));
        })
        .build()
}

/// State the ticket modal is rendered in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TicketModalState {
    pub subject: String,
    pub description: String,
    pub email: String,
    pub loading: bool,
}

impl TicketModalState {
    pub fn loading(email: impl Into<String>) -> Self {
        Self { email: email.into(), loading: true, ..Self::default() }
    }
}

fn plain_text_input(
    action_id: &str,
    placeholder: &str,
    initial_value: &str,
    multiline: bool,
) -> InputElement {
    InputElement::PlainTextInput {
        action_id: action_id.to_string(),
        placeholder: Some(TextObject::plain(placeholder)),
        initial_value: (!initial_value.is_empty()).then(|| initial_value.to_string()),
        multiline,
    }
}

pub fn ticket_modal(state: &TicketModalState) -> ModalView {
    let mut blocks = Vec::new();
    if state.loading {
        blocks.push(Block::Context {
            block_id: None,
            elements: vec![TextObject::mrkdwn("⏳ *Loading conversation context...*")],
        });
    } else if !state.subject.is_empty() || !state.description.is_empty() {
        blocks.push(Block::Context {
            block_id: None,
            elements: vec![TextObject::mrkdwn(
                "📝 *Pre-filled from your conversation.* Feel free to edit.",
            )],
        });
    }

    let default_priority = TicketPriority::default();
    blocks.extend([
        Block::Input {
            block_id: SUBJECT_BLOCK_ID.to_string(),
            label: TextObject::plain("Subject"),
            element: plain_text_input(
                SUBJECT_ACTION_ID,
                "Brief description of your issue",
                truncate_chars(&state.subject, SUBJECT_MAX_CHARS),
                false,
            ),
        },
        Block::Input {
            block_id: DESCRIPTION_BLOCK_ID.to_string(),
            label: TextObject::plain("Description"),
            element: plain_text_input(
                DESCRIPTION_ACTION_ID,
                "Describe your issue in detail...",
                truncate_chars(&state.description, DESCRIPTION_MAX_CHARS),
                true,
            ),
        },
        Block::Input {
            block_id: EMAIL_BLOCK_ID.to_string(),
            label: TextObject::plain("Your Email"),
            element: plain_text_input(EMAIL_ACTION_ID, "your.email@company.com", &state.email, false),
        },
        Block::Input {
            block_id: PRIORITY_BLOCK_ID.to_string(),
            label: TextObject::plain("Priority"),
            element: InputElement::StaticSelect {
                action_id: PRIORITY_ACTION_ID.to_string(),
                placeholder: TextObject::plain("Select priority"),
                options: TicketPriority::ALL
                    .iter()
                    .map(|priority| SelectOption::new(priority.label(), priority.as_str()))
                    .collect(),
                initial_option: Some(SelectOption::new(
                    default_priority.label(),
                    default_priority.as_str(),
                )),
            },
        },
    ]);

    ModalView {
        callback_id: TICKET_CALLBACK_ID.to_string(),
        title: TextObject::plain("Create Support Ticket"),
        submit: Some(TextObject::plain("Submit Ticket")),
        close: Some(TextObject::plain("Cancel")),
        blocks,
    }
}

pub fn ticket_created_text(
    ticket_id: u64,
    subject: &str,
    priority: TicketPriority,
    email: &str,
) -> String {
    format!(
        "✅ *Ticket created successfully!*\n\n*Ticket ID:* #{ticket_id}\n*Subject:* {subject}\n*Priority:* {}\n\nOur support team will respond to your email ({email}) shortly.",
        priority.label()
    )
}

pub fn ticket_failed_text(error: &str) -> String {
    format!(
        "❌ *Failed to create ticket*\n\nError: {error}\n\nPlease try again or contact support directly."
    )
}
