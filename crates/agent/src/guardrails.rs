use std::sync::OnceLock;

use docbot_core::config::DocsConfig;
use docbot_core::docs::{truncate_chars, DocResult};
use docbot_core::errors::DomainError;
use regex_lite::Regex;

use crate::prompts::NO_RESULTS_ANSWER;

pub const MAX_QUESTION_CHARS: usize = 2000;
const REDACTED: &str = "[redacted]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GuardrailPolicy {
    pub max_question_chars: usize,
    pub min_relevance_score: Option<f64>,
    pub redact_credentials: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            max_question_chars: MAX_QUESTION_CHARS,
            min_relevance_score: None,
            redact_credentials: true,
        }
    }
}

fn credential_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(?:xox[bpa]|xapp)-[A-Za-z0-9-]+|\bsk-[A-Za-z0-9_-]{16,}").ok())
        .as_ref()
}

impl GuardrailPolicy {
    pub fn from_config(docs: &DocsConfig) -> Self {
        Self { min_relevance_score: docs.min_relevance_score, ..Self::default() }
    }

    /// Trimmed question, capped at `max_question_chars`.
    pub fn check_question(&self, question: &str) -> Result<String, DomainError> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyQuery);
        }
        Ok(truncate_chars(trimmed, self.max_question_chars).to_string())
    }

    pub fn evaluate_retrieval(&self, docs: &[DocResult]) -> GuardrailDecision {
        let Some(best) = docs.iter().map(|doc| doc.score).reduce(f64::max) else {
            return GuardrailDecision::Degrade {
                reason_code: "no_documentation",
                user_message: NO_RESULTS_ANSWER.to_string(),
                fallback_path: "no_results_reply",
            };
        };

        match self.min_relevance_score {
            Some(threshold) if best < threshold => GuardrailDecision::Degrade {
                reason_code: "low_relevance",
                user_message: NO_RESULTS_ANSWER.to_string(),
                fallback_path: "no_results_reply",
            },
            _ => GuardrailDecision::Allow,
        }
    }

    /// Masks anything shaped like a Slack or OpenAI credential.
    pub fn redact(&self, answer: &str) -> String {
        if !self.redact_credentials {
            return answer.to_string();
        }
        match credential_pattern() {
            Some(pattern) => pattern.replace_all(answer, REDACTED).into_owned(),
            None => answer.to_string(),
        }
    }
}
