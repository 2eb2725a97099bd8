use serde::Deserialize;

/// One message of a Slack thread, as returned by `conversations.replies`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl ThreadMessage {
    pub fn from_user(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self { user: Some(user.into()), text: text.into(), ..Self::default() }
    }

    pub fn from_bot(bot_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { bot_id: Some(bot_id.into()), text: text.into(), ..Self::default() }
    }

    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThreadTranscript {
    messages: Vec<ThreadMessage>,
}

impl ThreadTranscript {
    pub fn new(messages: Vec<ThreadMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ThreadMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `Bot: …` / `User (U123): …` lines separated by blank lines.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|message| {
                if message.is_from_bot() {
                    format!("Bot: {}", message.text)
                } else {
                    let user = message.user.as_deref().unwrap_or("unknown");
                    format!("User ({user}): {}", message.text)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Whether the bot has posted in the thread, either as its own user or
    /// through any bot integration.
    pub fn bot_participated(&self, bot_user_id: Option<&str>) -> bool {
        self.messages.iter().any(|message| {
            message.is_from_bot()
                || matches!((bot_user_id, message.user.as_deref()), (Some(bot), Some(user)) if bot == user)
        })
    }
}
