use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::McpResult;

#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Calls `name` and returns the text the tool produced.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> McpResult<String>;

    async fn list_tools(&self) -> McpResult<Vec<String>>;

    /// Closes any open session. Safe to call when never connected.
    async fn disconnect(&self);
}
