use std::path::Path;

use docbot_mcp::{DocsClient, McpError};

use crate::commands::{block_on, load_config, CommandResult};

/// Direct calls against the documentation MCP server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocsAction {
    Get { path: String },
    List,
    Prefetch { paths: Vec<String> },
    Cache,
    Tools,
}

impl DocsAction {
    fn command(&self) -> &'static str {
        match self {
            Self::Get { .. } => "docs get",
            Self::List => "docs list",
            Self::Prefetch { .. } => "docs prefetch",
            Self::Cache => "docs cache",
            Self::Tools => "docs tools",
        }
    }
}

pub fn run(action: DocsAction, config_path: Option<&Path>) -> CommandResult {
    let command = action.command();
    let config = match load_config(command, config_path) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let client = match DocsClient::from_config(&config.docs) {
        Ok(client) => client,
        Err(error) => return CommandResult::upstream_failure(command, format!("Error: {error}")),
    };

    let outcome = block_on(command, async {
        let result = execute(&client, &action).await;
        client.disconnect().await;
        result
    });

    match outcome {
        Ok(Ok(output)) => CommandResult::text(output),
        Ok(Err(error)) => CommandResult::upstream_failure(command, format!("Error: {error}")),
        Err(failure) => failure,
    }
}

pub async fn execute(client: &DocsClient, action: &DocsAction) -> Result<String, McpError> {
    match action {
        DocsAction::Get { path } => client.get_doc(path).await,
        DocsAction::List => Ok(client.list_docs().await?.join("\n")),
        DocsAction::Prefetch { paths } => client.prefetch_docs(paths).await,
        DocsAction::Cache => client.cache_status().await,
        DocsAction::Tools => Ok(client.list_tools().await?.join("\n")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use docbot_core::config::AppConfig;
    use docbot_mcp::{DocsClient, McpError, ToolInvoker, ToolNames};
    use serde_json::{json, Map, Value};

    use super::{execute, DocsAction};

    #[derive(Default)]
    struct CatalogInvoker {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl ToolInvoker for CatalogInvoker {
        async fn call_tool(
            &self,
            name: &str,
            arguments: Map<String, Value>,
        ) -> Result<String, McpError> {
            self.calls.lock().expect("calls lock").push((name.to_owned(), Value::Object(arguments)));
            match name {
                "ListNgrokDocs" => Ok("docs/getting-started\ndocs/traffic-policy".to_owned()),
                "FetchNgrokDoc" => Ok("# Getting started".to_owned()),
                "PrefetchNgrokDocs" => Ok("prefetched 2 docs".to_owned()),
                "NgrokDocsCacheStatus" => Ok("cached: 12".to_owned()),
                other => Err(McpError::Tool { tool: other.to_owned(), message: "unknown".to_owned() }),
            }
        }

        async fn list_tools(&self) -> Result<Vec<String>, McpError> {
            Ok(vec!["SearchNgrokDocumentation".to_owned(), "ListNgrokDocs".to_owned()])
        }

        async fn disconnect(&self) {}
    }

    fn client(invoker: Arc<CatalogInvoker>) -> DocsClient {
        DocsClient::new(invoker, ToolNames::from_config(&AppConfig::default().docs))
    }

    #[tokio::test]
    async fn catalog_actions_map_to_configured_tools() {
        let invoker = Arc::new(CatalogInvoker::default());
        let client = client(invoker.clone());

        let listed = execute(&client, &DocsAction::List).await.expect("list");
        assert_eq!(listed, "docs/getting-started\ndocs/traffic-policy");

        let doc = execute(&client, &DocsAction::Get { path: "docs/getting-started".to_owned() })
            .await
            .expect("get");
        assert_eq!(doc, "# Getting started");

        let prefetched = execute(
            &client,
            &DocsAction::Prefetch { paths: vec!["a".to_owned(), "b".to_owned()] },
        )
        .await
        .expect("prefetch");
        assert_eq!(prefetched, "prefetched 2 docs");

        let calls = invoker.calls.lock().expect("calls lock").clone();
        assert_eq!(calls[1], ("FetchNgrokDoc".to_owned(), json!({"path": "docs/getting-started"})));
        assert_eq!(calls[2], ("PrefetchNgrokDocs".to_owned(), json!({"paths": ["a", "b"]})));
    }

    #[tokio::test]
    async fn tools_and_cache_render_as_text() {
        let client = client(Arc::new(CatalogInvoker::default()));

        assert_eq!(
            execute(&client, &DocsAction::Tools).await.expect("tools"),
            "SearchNgrokDocumentation\nListNgrokDocs"
        );
        assert_eq!(execute(&client, &DocsAction::Cache).await.expect("cache"), "cached: 12");
    }
}
