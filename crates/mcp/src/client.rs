use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use docbot_core::config::DocsConfig;
use docbot_core::docs::{
    is_kubernetes_doc, parse_search_results, rank, retry_queries, search_queries,
    wants_kubernetes, DocResult,
};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::{
    fetcher::{HttpPageFetcher, PageFetcher},
    invoker::ToolInvoker,
    tools::DocsTool,
    tools::ToolNames,
    transport::RemoteToolInvoker,
    McpError, McpResult,
};

/// Search pipeline and catalog operations over the documentation server.
#[derive(Clone)]
pub struct DocsClient {
    invoker: Arc<dyn ToolInvoker>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    tools: ToolNames,
}

impl DocsClient {
    pub fn new(invoker: Arc<dyn ToolInvoker>, tools: ToolNames) -> Self {
        Self { invoker, fetcher: None, tools }
    }

    /// Remote session against `docs.mcp_url`, with page enrichment when enabled.
    pub fn from_config(config: &DocsConfig) -> McpResult<Self> {
        let invoker = RemoteToolInvoker::new(
            config.mcp_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        );
        let client = Self::new(Arc::new(invoker), ToolNames::from_config(config));
        if !config.enrich_pages {
            return Ok(client);
        }

        let fetcher = HttpPageFetcher::new(Duration::from_secs(config.page_fetch_timeout_secs))
            .map_err(|error| McpError::Connect {
                url: config.mcp_url.clone(),
                message: format!("page fetcher unavailable: {error}"),
            })?;
        Ok(client.with_page_fetcher(Arc::new(fetcher)))
    }

    /// Enables page enrichment for search hits.
    pub fn with_page_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn tool_names(&self) -> &ToolNames {
        &self.tools
    }

    pub async fn search_docs(&self, query: &str, max_results: usize) -> McpResult<Vec<DocResult>> {
        let (mut results, failure) =
            self.run_search_queries(&search_queries(query), max_results).await;
        if results.is_empty() {
            if let Some(error) = failure {
                return Err(error);
            }
        }

        if !wants_kubernetes(query) {
            let general: Vec<DocResult> =
                results.iter().filter(|doc| !is_kubernetes_doc(doc)).cloned().collect();
            if !general.is_empty() {
                results = general;
            } else {
                debug!(query, "only kubernetes docs matched; retrying with action queries");
                let (retry, _) = self.run_search_queries(&retry_queries(query), max_results).await;
                let retry_general: Vec<DocResult> =
                    retry.into_iter().filter(|doc| !is_kubernetes_doc(doc)).collect();
                if !retry_general.is_empty() {
                    results = retry_general;
                }
            }
        }

        let mut ranked = rank(results, query, max_results);
        self.enrich(&mut ranked).await;
        Ok(ranked)
    }

    /// Runs queries in order, deduplicating by link, until twice `max_results`
    /// docs are collected. Failed queries are skipped; the last failure is
    /// returned alongside whatever succeeded.
    async fn run_search_queries(
        &self,
        queries: &[String],
        max_results: usize,
    ) -> (Vec<DocResult>, Option<McpError>) {
        let mut seen_links = HashSet::new();
        let mut results = Vec::new();
        let mut failure = None;

        for query in queries {
            let arguments = object(json!({ "query": query }));
            match self.invoker.call_tool(self.tools.name(DocsTool::Search), arguments).await {
                Ok(raw) => {
                    for doc in parse_search_results(&raw, max_results) {
                        if seen_links.insert(doc.link.clone()) {
                            results.push(doc);
                        }
                    }
                }
                Err(error) => {
                    warn!(query = %query, error = %error, "docs search query failed");
                    failure = Some(error);
                    continue;
                }
            }
            if results.len() >= max_results * 2 {
                break;
            }
        }

        (results, failure)
    }

    async fn enrich(&self, docs: &mut [DocResult]) {
        let Some(fetcher) = &self.fetcher else {
            return;
        };
        for doc in docs.iter_mut().filter(|doc| !doc.link.is_empty()) {
            if let Some(page) = fetcher.fetch_markdown(&doc.link).await {
                doc.enrich_with_page(&page);
            }
        }
    }

    pub async fn get_doc(&self, path: &str) -> McpResult<String> {
        let arguments = object(json!({ "path": path }));
        self.invoker.call_tool(self.tools.name(DocsTool::Fetch), arguments).await
    }

    pub async fn list_docs(&self) -> McpResult<Vec<String>> {
        let raw = self.invoker.call_tool(self.tools.name(DocsTool::List), Map::new()).await?;
        Ok(raw.split('\n').map(str::to_owned).collect())
    }

    pub async fn prefetch_docs(&self, paths: &[String]) -> McpResult<String> {
        let arguments = object(json!({ "paths": paths }));
        self.invoker.call_tool(self.tools.name(DocsTool::Prefetch), arguments).await
    }

    pub async fn cache_status(&self) -> McpResult<String> {
        self.invoker.call_tool(self.tools.name(DocsTool::CacheStatus), Map::new()).await
    }

    pub async fn list_tools(&self) -> McpResult<Vec<String>> {
        self.invoker.list_tools().await
    }

    pub async fn disconnect(&self) {
        self.invoker.disconnect().await;
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
