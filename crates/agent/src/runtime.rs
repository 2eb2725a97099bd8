use std::sync::Arc;

use docbot_core::config::AppConfig;
use docbot_core::docs::{build_doc_context, QueryCategory};
use docbot_core::errors::{ApplicationError, DomainError};
use docbot_core::support::TicketDraft;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{llm_from_config, ChatMessage, CompletionRequest, LlmClient, LlmError};
use crate::prompts::{
    answer_system_prompt, answer_user_prompt, fallback_answer, strip_code_fence,
    ticket_user_prompt, yaml_system_prompt, yaml_user_prompt, LLM_REQUIRED_MESSAGE,
    TICKET_SYSTEM_PROMPT,
};
use crate::retrieval::{retriever_from_config, DocsRetriever, RetrievalError};

pub const YAML_MAX_RESULTS: usize = 8;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("OpenAI API key required for YAML generation.")]
    LlmRequired,
}

impl AssistantError {
    pub fn into_application(self) -> ApplicationError {
        match self {
            Self::Domain(error) => ApplicationError::Domain(error),
            Self::Retrieval(error) => ApplicationError::Integration(error.to_string()),
            Self::Llm(error) => ApplicationError::Integration(error.to_string()),
            Self::LlmRequired => ApplicationError::Configuration(LLM_REQUIRED_MESSAGE.to_string()),
        }
    }
}

/// Models for answers and ticket drafts, and for YAML generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantModels {
    pub answer: String,
    pub yaml: String,
}

/// Answers questions, drafts YAML and summarises threads from retrieved
/// documentation. Without an LLM it falls back to quoting the best hit.
pub struct DocsAssistant {
    retriever: Arc<dyn DocsRetriever>,
    llm: Option<Arc<dyn LlmClient>>,
    guardrails: GuardrailPolicy,
    models: AssistantModels,
    max_results: usize,
}

impl DocsAssistant {
    pub fn new(
        retriever: Arc<dyn DocsRetriever>,
        llm: Option<Arc<dyn LlmClient>>,
        guardrails: GuardrailPolicy,
        models: AssistantModels,
        max_results: usize,
    ) -> Self {
        Self { retriever, llm, guardrails, models, max_results }
    }

    pub fn from_config(
        config: &AppConfig,
        retriever: Arc<dyn DocsRetriever>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self::new(
            retriever,
            llm,
            GuardrailPolicy::from_config(&config.docs),
            AssistantModels {
                answer: config.llm.answer_model.clone(),
                yaml: config.llm.yaml_model.clone(),
            },
            config.docs.max_results,
        )
    }

    /// Retriever and LLM for the configured backends.
    pub fn connect(config: &AppConfig) -> Result<Self, AssistantError> {
        let retriever = retriever_from_config(config)?;
        let llm = llm_from_config(&config.llm)?;
        Ok(Self::from_config(config, retriever, llm))
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_some()
    }

    pub fn retriever(&self) -> &Arc<dyn DocsRetriever> {
        &self.retriever
    }

    pub async fn ask(
        &self,
        question: &str,
        thread_context: Option<&str>,
    ) -> Result<String, AssistantError> {
        let question = self.guardrails.check_question(question)?;
        let docs = self.retriever.retrieve(&question, self.max_results).await?;

        if let GuardrailDecision::Degrade { reason_code, user_message, fallback_path } =
            self.guardrails.evaluate_retrieval(&docs)
        {
            info!(
                event_name = "assistant.ask.degraded",
                reason_code,
                fallback_path,
                hits = docs.len(),
                "answering without documentation"
            );
            return Ok(user_message);
        }

        let Some(llm) = &self.llm else {
            return Ok(self.guardrails.redact(&fallback_answer(&docs[0])));
        };

        let category = QueryCategory::classify(&question);
        let request = CompletionRequest {
            model: self.models.answer.clone(),
            messages: vec![
                ChatMessage::system(answer_system_prompt(category)),
                ChatMessage::user(answer_user_prompt(
                    &question,
                    &build_doc_context(&docs),
                    thread_context,
                )),
            ],
            temperature: 0.3,
            max_tokens: 1000,
        };
        debug!(category = category.as_str(), hits = docs.len(), "synthesizing answer");

        let answer = match llm.complete(request).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(
                    event_name = "assistant.ask.llm_failed",
                    error = %error,
                    fallback_path = "excerpt_answer",
                    "answer synthesis failed; quoting best document"
                );
                fallback_answer(&docs[0])
            }
        };
        Ok(self.guardrails.redact(&answer))
    }

    pub async fn generate_yaml(&self, request: &str) -> Result<String, AssistantError> {
        let Some(llm) = &self.llm else {
            return Err(AssistantError::LlmRequired);
        };
        let request = self.guardrails.check_question(request)?;

        let docs = self.retriever.retrieve(&request, YAML_MAX_RESULTS).await?;
        let category = QueryCategory::classify(&request);
        let completion = CompletionRequest {
            model: self.models.yaml.clone(),
            messages: vec![
                ChatMessage::system(yaml_system_prompt(category)),
                ChatMessage::user(yaml_user_prompt(&request, &build_doc_context(&docs))),
            ],
            temperature: 0.2,
            max_tokens: 1500,
        };

        let yaml = llm.complete(completion).await?;
        Ok(self.guardrails.redact(&yaml))
    }

    /// Proposes a ticket subject and description for a thread transcript.
    /// Any model failure falls back to the raw transcript.
    pub async fn synthesize_ticket(&self, thread_context: &str) -> TicketDraft {
        let fallback = || TicketDraft::from_transcript(thread_context);
        let Some(llm) = &self.llm else {
            return fallback();
        };

        let request = CompletionRequest {
            model: self.models.answer.clone(),
            messages: vec![
                ChatMessage::system(TICKET_SYSTEM_PROMPT),
                ChatMessage::user(ticket_user_prompt(thread_context)),
            ],
            temperature: 0.3,
            max_tokens: 500,
        };

        let content = match llm.complete(request).await {
            Ok(content) => content,
            Err(error) => {
                warn!(error = %error, "ticket synthesis failed; using transcript");
                return fallback();
            }
        };

        match serde_json::from_str::<TicketDraft>(strip_code_fence(&content)) {
            Ok(draft) if !draft.is_empty() => draft,
            Ok(_) => fallback(),
            Err(error) => {
                warn!(error = %error, "ticket synthesis returned unparseable JSON");
                fallback()
            }
        }
    }
}
