//! Slack interface for the ngrok docs bot
//!
//! - **Socket Mode** (`socket`) - WebSocket session with Slack, acks before dispatch
//! - **Signature** (`signature`) - `v0` request verification for HTTP ingress
//! - **Slash Commands** (`commands`) - `/ngrok-ask`, `/ngrok-yaml`, `/ngrok-help`, `/ngrok-ticket`
//! - **Events** (`events`) - mentions, DMs and thread replies, button clicks, modal submissions
//! - **Block Kit** (`blocks`) - answer, help and greeting messages, the ticket modal
//! - **Web API** (`api`) - `chat.postMessage`, `conversations.replies`, `views.*`, ...
//! - **Handlers** (`handlers`) - `DocsBot`, the behaviour behind every event
//!
//! # Architecture
//!
//! ```text
//! Socket Mode / HTTP → EventDispatcher → DocsBot → DocsAssistant
//!                                           ↓
//!                         Block Kit reply ← Web API
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod handlers;
pub mod signature;
pub mod socket;

pub use api::{SlackApi, SlackApiError, SlackWebClient};
pub use events::{docs_dispatcher, EventDispatcher, SlackEnvelope, SlackEvent};
pub use handlers::{AssistantService, DocsBot, SupportTicketService, TicketError};
pub use signature::SignatureVerifier;
pub use socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport};
