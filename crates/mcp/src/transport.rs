use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, CallToolResult, RawContent, ResourceContents};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{invoker::ToolInvoker, McpError, McpResult};

type ClientSession = RunningService<RoleClient, ()>;

/// Picks the text a tool call produced: the first text item, else an embedded
/// text resource, else structured content as JSON, else a debug dump.
pub fn result_text(result: &CallToolResult) -> String {
    if let Some(first) = result.content.first() {
        match &first.raw {
            RawContent::Text(text) => return text.text.clone(),
            RawContent::Resource(embedded) => {
                if let ResourceContents::TextResourceContents { text, .. } = &embedded.resource {
                    return text.clone();
                }
            }
            _ => {}
        }
    }

    match &result.structured_content {
        Some(structured) if !structured.is_null() => structured.to_string(),
        _ => format!("{:?}", result.content),
    }
}

/// Holds at most one live session, stamped with the generation that opened it.
///
/// Callers remember the generation they leased so a late failure only clears
/// the session it actually used.
pub(crate) struct SessionSlot<S> {
    state: Mutex<SlotState<S>>,
}

struct SlotState<S> {
    generation: u64,
    session: Option<S>,
}

impl<S> SessionSlot<S> {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(SlotState { generation: 0, session: None }) }
    }

    /// Projects the live session, opening a new generation when there is none.
    pub(crate) async fn lease<P, F, Fut>(
        &self,
        connect: F,
        project: impl Fn(&S) -> P,
    ) -> McpResult<(u64, P)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = McpResult<S>>,
    {
        let mut state = self.state.lock().await;
        if let Some(session) = state.session.as_ref() {
            return Ok((state.generation, project(session)));
        }

        let session = connect().await?;
        let leased = project(&session);
        state.generation += 1;
        state.session = Some(session);
        Ok((state.generation, leased))
    }

    /// Removes the session only if it is still the one from `generation`.
    pub(crate) async fn take_if_current(&self, generation: u64) -> Option<S> {
        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.session.take()
        } else {
            None
        }
    }

    pub(crate) async fn take(&self) -> Option<S> {
        self.state.lock().await.session.take()
    }
}

/// One lazily-opened rmcp session against the documentation server.
///
/// The session is shared by every caller; a transport failure drops it so the
/// next call reconnects.
pub struct RemoteToolInvoker {
    url: String,
    timeout: Duration,
    session: SessionSlot<ClientSession>,
}

impl RemoteToolInvoker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { url: url.into(), timeout, session: SessionSlot::new() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn peer(&self) -> McpResult<(u64, Peer<RoleClient>)> {
        self.session.lease(|| self.connect(), |session| session.peer().clone()).await
    }

    async fn connect(&self) -> McpResult<ClientSession> {
        debug!(event_name = "mcp.session.connect", url = %self.url, "connecting to docs server");
        let transport = StreamableHttpClientTransport::from_uri(self.url.clone());
        let session = tokio::time::timeout(self.timeout, ().serve(transport))
            .await
            .map_err(|_| McpError::Timeout {
                operation: "connect".to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|error| McpError::Connect {
                url: self.url.clone(),
                message: error.to_string(),
            })?;
        info!(event_name = "mcp.session.connected", url = %self.url, "docs server session ready");
        Ok(session)
    }

    async fn reset(&self, generation: u64, reason: &str) {
        let Some(session) = self.session.take_if_current(generation).await else {
            debug!(
                event_name = "mcp.session.reset_skipped",
                url = %self.url,
                generation,
                reason,
                "docs server session already replaced"
            );
            return;
        };
        warn!(
            event_name = "mcp.session.reset",
            url = %self.url,
            generation,
            reason,
            "dropping docs server session"
        );
        close_session(&self.url, session).await;
    }
}

async fn close_session(url: &str, session: ClientSession) {
    if let Err(error) = session.cancel().await {
        debug!(
            event_name = "mcp.session.cancel_failed",
            url,
            error = %error,
            "docs server session did not shut down cleanly"
        );
    }
}

#[async_trait]
impl ToolInvoker for RemoteToolInvoker {
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> McpResult<String> {
        let (generation, peer) = self.peer().await?;
        let request =
            CallToolRequestParam { name: name.to_string().into(), arguments: Some(arguments) };

        let outcome = tokio::time::timeout(self.timeout, peer.call_tool(request)).await;
        let result = match outcome {
            Err(_) => {
                self.reset(generation, "timeout").await;
                return Err(McpError::Timeout {
                    operation: name.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
            Ok(Err(error)) => {
                self.reset(generation, "transport").await;
                return Err(McpError::Transport {
                    tool: name.to_string(),
                    message: error.to_string(),
                });
            }
            Ok(Ok(result)) => result,
        };

        let text = result_text(&result);
        if result.is_error.unwrap_or(false) {
            return Err(McpError::Tool { tool: name.to_string(), message: text });
        }
        Ok(text)
    }

    async fn list_tools(&self) -> McpResult<Vec<String>> {
        let (generation, peer) = self.peer().await?;
        let outcome = tokio::time::timeout(self.timeout, peer.list_all_tools()).await;
        match outcome {
            Err(_) => {
                self.reset(generation, "timeout").await;
                Err(McpError::Timeout {
                    operation: "list_tools".to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(error)) => {
                self.reset(generation, "transport").await;
                Err(McpError::Transport {
                    tool: "list_tools".to_string(),
                    message: error.to_string(),
                })
            }
            Ok(Ok(tools)) => Ok(tools.into_iter().map(|tool| tool.name.to_string()).collect()),
        }
    }

    async fn disconnect(&self) {
        if let Some(session) = self.session.take().await {
            close_session(&self.url, session).await;
            info!(event_name = "mcp.session.closed", url = %self.url, "docs server session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rmcp::model::{CallToolResult, Content};
    use serde_json::json;

    use super::{result_text, RemoteToolInvoker, SessionSlot};
    use crate::{McpError, McpResult, ToolInvoker};

    #[test]
    fn first_text_item_wins() {
        let result = CallToolResult::success(vec![
            Content::text("Title: OAuth"),
            Content::text("Title: OIDC"),
        ]);
        assert_eq!(result_text(&result), "Title: OAuth");
    }

    #[test]
    fn structured_result_yields_json_text() {
        let result = CallToolResult::structured(json!({"cached": 12}));
        // `structured` also mirrors the value as a text item.
        assert!(result_text(&result).contains("\"cached\":12"));
    }

    #[test]
    fn empty_result_falls_back_to_debug_rendering() {
        let result = CallToolResult::success(Vec::new());
        assert_eq!(result_text(&result), "[]");
    }

    #[tokio::test]
    async fn unreachable_server_reports_connect_error() {
        let invoker =
            RemoteToolInvoker::new("http://127.0.0.1:9/mcp", Duration::from_secs(5));

        let error = invoker.list_tools().await.expect_err("nothing listens on port 9");

        assert!(error.is_transient(), "unexpected error: {error:?}");
        assert!(matches!(error, McpError::Connect { .. } | McpError::Timeout { .. }));
        invoker.disconnect().await;
    }

    async fn open(name: &str) -> McpResult<String> {
        Ok(name.to_owned())
    }

    async fn must_not_reconnect() -> McpResult<String> {
        panic!("a live session should be reused")
    }

    #[tokio::test]
    async fn stale_failure_keeps_the_replacement_session() {
        let slot = SessionSlot::new();

        // Two callers share the first session.
        let (first_a, _) = slot.lease(|| open("first"), String::clone).await.expect("lease");
        let (first_b, _) = slot.lease(must_not_reconnect, String::clone).await.expect("lease");
        assert_eq!(first_a, first_b);

        // B fails first, drops the session and reconnects.
        assert_eq!(slot.take_if_current(first_b).await.as_deref(), Some("first"));
        let (second, session) = slot.lease(|| open("second"), String::clone).await.expect("lease");
        assert_eq!(session, "second");
        assert_ne!(second, first_a);

        // A's failure arrives late and must not touch B's session.
        assert_eq!(slot.take_if_current(first_a).await, None);
        let (current, session) = slot.lease(must_not_reconnect, String::clone).await.expect("lease");
        assert_eq!((current, session.as_str()), (second, "second"));
    }

    #[tokio::test]
    async fn concurrent_failures_from_one_generation_reset_once() {
        let slot = SessionSlot::new();
        let (generation, _) = slot.lease(|| open("shared"), String::clone).await.expect("lease");

        let (a, b) = tokio::join!(slot.take_if_current(generation), slot.take_if_current(generation));

        assert_eq!([a, b].into_iter().flatten().collect::<Vec<_>>(), vec!["shared".to_owned()]);
    }

    #[tokio::test]
    async fn failed_connect_leaves_the_slot_empty() {
        let slot: SessionSlot<String> = SessionSlot::new();
        let error = slot
            .lease(
                || async { Err(McpError::Connect { url: "http://docs".to_owned(), message: "refused".to_owned() }) },
                String::clone,
            )
            .await
            .expect_err("connect fails");
        assert!(matches!(error, McpError::Connect { .. }));

        let (generation, session) = slot.lease(|| open("retry"), String::clone).await.expect("lease");
        assert_eq!((generation, session.as_str()), (1, "retry"));
    }
}
