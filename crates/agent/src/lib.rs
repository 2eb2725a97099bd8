//! Documentation assistant for the ngrok docs bot.
//!
//! A question flows through a constrained loop:
//! 1. **Guardrails** (`guardrails`) - reject empty input, cap its length
//! 2. **Retrieval** (`retrieval`) - MCP search or vector-store lookup
//! 3. **Synthesis** (`runtime`, `prompts`, `llm`) - an answer grounded only
//!    in the retrieved documentation, or the best excerpt when no model is
//!    configured
//! 4. **Redaction** - credential-shaped tokens never leave the assistant
//!
//! `conversation` models Slack thread transcripts used as follow-up context
//! and for support ticket drafts.

pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod prompts;
pub mod retrieval;
pub mod runtime;

pub use conversation::{ThreadMessage, ThreadTranscript};
pub use guardrails::{GuardrailDecision, GuardrailPolicy};
pub use llm::{llm_from_config, LlmClient, LlmError, OpenAiCompatibleClient};
pub use retrieval::{
    retriever_from_config, ChromaRetriever, DocsRetriever, EmbeddingClient, McpRetriever,
    RetrievalError,
};
pub use runtime::{AssistantError, AssistantModels, DocsAssistant};
