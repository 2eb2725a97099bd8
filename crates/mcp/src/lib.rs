//! Client for the ngrok documentation MCP server.
//!
//! - [`ToolInvoker`]: the seam over "call a named tool with JSON arguments"
//! - [`RemoteToolInvoker`]: rmcp session over streamable HTTP
//! - [`PageFetcher`]: raw markdown download used to enrich search hits
//! - [`DocsClient`]: search pipeline and catalog helpers built on both

mod client;
mod fetcher;
mod invoker;
mod tools;
mod transport;

pub use client::DocsClient;
pub use fetcher::{markdown_url, HttpPageFetcher, PageFetcher};
pub use invoker::ToolInvoker;
pub use tools::{DocsTool, ToolNames};
pub use transport::{result_text, RemoteToolInvoker};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("could not connect to documentation server at {url}: {message}")]
    Connect { url: String, message: String },

    #[error("transport failure while calling `{tool}`: {message}")]
    Transport { tool: String, message: String },

    #[error("tool `{tool}` reported an error: {message}")]
    Tool { tool: String, message: String },

    #[error("`{operation}` timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("could not decode tool output: {0}")]
    Decode(String),
}

impl McpError {
    /// Connection-level failures; a retry after reconnecting may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Transport { .. } | Self::Timeout { .. })
    }
}

pub type McpResult<T> = Result<T, McpError>;
