use serde::{Deserialize, Serialize};

use crate::docs::truncate_chars;
use crate::errors::DomainError;

pub const SUBJECT_DRAFT_MAX_CHARS: usize = 100;
pub const SUBJECT_MAX_CHARS: usize = 150;
pub const DESCRIPTION_MAX_CHARS: usize = 3000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [Self::Low, Self::Normal, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(DomainError::InvalidTicket(format!("unknown priority `{other}`"))),
        }
    }
}

/// Subject and description proposed for a ticket, before the user edits them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: String,
}

impl TicketDraft {
    /// Draft built straight from a transcript, used when no LLM summary exists.
    pub fn from_transcript(transcript: &str) -> Self {
        Self {
            subject: truncate_chars(transcript, SUBJECT_DRAFT_MAX_CHARS).to_owned(),
            description: truncate_chars(transcript, DESCRIPTION_MAX_CHARS).to_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subject.is_empty() && self.description.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SupportTicket {
    pub subject: String,
    pub description: String,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub priority: TicketPriority,
    pub tags: Vec<String>,
}

impl SupportTicket {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.subject.trim().is_empty() {
            return Err(DomainError::InvalidTicket("subject is required".to_owned()));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::InvalidTicket("description is required".to_owned()));
        }
        if let Some(email) = &self.requester_email {
            if !email.contains('@') {
                return Err(DomainError::InvalidTicket(format!(
                    "requester email `{email}` is not an address"
                )));
            }
        }
        Ok(())
    }
}

/// Appended to every ticket filed from Slack so agents know where it came from.
pub fn slack_submission_footer(description: &str, submitter: &str) -> String {
    format!("{description}\n\n---\nSubmitted via Slack by {submitter}")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReceipt {
    pub id: u64,
    pub url: String,
}
