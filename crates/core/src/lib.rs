pub mod config;
pub mod docs;
pub mod errors;
pub mod support;

pub use config::{AppConfig, ConfigError, DocsBackend, LlmProvider, LoadOptions, SlackMode};
pub use docs::{build_doc_context, DocResult, QueryCategory};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use support::{SupportTicket, TicketDraft, TicketPriority, TicketReceipt};
