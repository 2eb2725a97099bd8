use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbot_core::config::{AppConfig, LlmConfig, VectorConfig};
use docbot_core::docs::{extract_yaml_blocks, score, DocResult, DEFAULT_DOC_TITLE};
use docbot_core::DocsBackend;
use docbot_mcp::{DocsClient, McpError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Mcp(#[from] McpError),
    #[error("embedding request failed: {0}")]
    Embedding(String),
    #[error("vector store request failed: {0}")]
    VectorStore(String),
}

impl RetrievalError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Mcp(error) => error.is_transient(),
            Self::Embedding(_) | Self::VectorStore(_) => true,
        }
    }
}

/// Source of documentation passages for a question.
#[async_trait]
pub trait DocsRetriever: Send + Sync {
    fn backend(&self) -> DocsBackend;

    async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<DocResult>, RetrievalError>;

    /// Cheap reachability check used by health and doctor.
    async fn probe(&self) -> Result<String, RetrievalError>;

    /// Releases any open session.
    async fn close(&self) {}
}

/// Retriever for the configured `docs.backend`.
pub fn retriever_from_config(config: &AppConfig) -> Result<Arc<dyn DocsRetriever>, RetrievalError> {
    match config.docs.backend {
        DocsBackend::Mcp => Ok(Arc::new(McpRetriever::new(DocsClient::from_config(&config.docs)?))),
        DocsBackend::VectorStore => {
            Ok(Arc::new(ChromaRetriever::from_config(&config.vector, &config.llm)?))
        }
    }
}

pub struct McpRetriever {
    client: DocsClient,
}

impl McpRetriever {
    pub fn new(client: DocsClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DocsClient {
        &self.client
    }
}

#[async_trait]
impl DocsRetriever for McpRetriever {
    fn backend(&self) -> DocsBackend {
        DocsBackend::Mcp
    }

    async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<DocResult>, RetrievalError> {
        Ok(self.client.search_docs(query, max_results).await?)
    }

    async fn probe(&self) -> Result<String, RetrievalError> {
        let tools = self.client.list_tools().await?;
        let missing = self.client.tool_names().missing_from(&tools);
        if missing.is_empty() {
            Ok(format!("{} tools available", tools.len()))
        } else {
            let names = missing.iter().map(|(_, name)| *name).collect::<Vec<_>>();
            Ok(format!("{} tools available; missing: {}", tools.len(), names.join(", ")))
        }
    }

    async fn close(&self) {
        self.client.disconnect().await;
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl EmbeddingClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "input": [text] }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| RetrievalError::Embedding(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!("{status}: {body}")));
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|error| RetrievalError::Embedding(error.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| RetrievalError::Embedding("response contained no embedding".into()))
    }
}

#[derive(Deserialize)]
struct Collection {
    id: String,
}

#[derive(Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<Map<String, Value>>>>,
}

/// Chroma REST retriever over an already-indexed collection.
pub struct ChromaRetriever {
    client: reqwest::Client,
    url: String,
    collection: String,
    top_k: usize,
    embeddings: EmbeddingClient,
    collection_id: OnceCell<String>,
}

impl ChromaRetriever {
    pub fn new(
        config: &VectorConfig,
        embeddings: EmbeddingClient,
        timeout: Duration,
    ) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RetrievalError::VectorStore(error.to_string()))?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            top_k: config.top_k,
            embeddings,
            collection_id: OnceCell::new(),
        })
    }

    /// Builds the retriever and its embedding client from configuration. The
    /// embedding endpoint defaults to the LLM provider's base URL.
    pub fn from_config(vector: &VectorConfig, llm: &LlmConfig) -> Result<Self, RetrievalError> {
        let timeout = Duration::from_secs(llm.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RetrievalError::Embedding(error.to_string()))?;
        let base_url =
            vector.embedding_url.clone().unwrap_or_else(|| llm.effective_base_url().to_string());
        let embeddings =
            EmbeddingClient::new(http, base_url, vector.embedding_model.clone(), llm.api_key.clone());
        Self::new(vector, embeddings, timeout)
    }

    async fn collection_id(&self) -> Result<&str, RetrievalError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections/{}", self.url, self.collection);
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|error| RetrievalError::VectorStore(error.to_string()))?;
                if !response.status().is_success() {
                    return Err(RetrievalError::VectorStore(format!(
                        "collection `{}` lookup returned {}",
                        self.collection,
                        response.status()
                    )));
                }
                let collection: Collection = response
                    .json()
                    .await
                    .map_err(|error| RetrievalError::VectorStore(error.to_string()))?;
                Ok::<String, RetrievalError>(collection.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

fn metadata_text<'a>(metadata: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a str> {
    metadata.and_then(|map| map.get(key)).and_then(Value::as_str).filter(|text| !text.is_empty())
}

#[async_trait]
impl DocsRetriever for ChromaRetriever {
    fn backend(&self) -> DocsBackend {
        DocsBackend::VectorStore
    }

    async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<DocResult>, RetrievalError> {
        let embedding = self.embeddings.embed(query).await?;
        let collection_id = self.collection_id().await?;

        let response = self
            .client
            .post(format!("{}/api/v1/collections/{collection_id}/query", self.url))
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": self.top_k,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await
            .map_err(|error| RetrievalError::VectorStore(error.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::VectorStore(format!("query returned {status}: {body}")));
        }
        let parsed: QueryResponse =
            response.json().await.map_err(|error| RetrievalError::VectorStore(error.to_string()))?;

        let documents = parsed.documents.into_iter().next().unwrap_or_default();
        let metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();
        let mut results: Vec<DocResult> = documents
            .into_iter()
            .enumerate()
            .filter_map(|(index, document)| {
                let document = document?;
                let metadata = metadatas.get(index).and_then(Option::as_ref);
                let mut doc = DocResult::new(
                    metadata_text(metadata, "title").unwrap_or(DEFAULT_DOC_TITLE),
                    metadata_text(metadata, "source").unwrap_or_default(),
                    document,
                );
                doc.yaml_examples = extract_yaml_blocks(&doc.content);
                doc.score = score(&doc, query);
                Some(doc)
            })
            .collect();
        results.truncate(max_results);

        debug!(query, hits = results.len(), "vector store query complete");
        Ok(results)
    }

    async fn probe(&self) -> Result<String, RetrievalError> {
        let response = self
            .client
            .get(format!("{}/api/v1/heartbeat", self.url))
            .send()
            .await
            .map_err(|error| RetrievalError::VectorStore(error.to_string()))?;
        if !response.status().is_success() {
            return Err(RetrievalError::VectorStore(format!(
                "heartbeat returned {}",
                response.status()
            )));
        }
        Ok(format!("collection `{}` at {}", self.collection, self.url))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use docbot_core::AppConfig;
    use mockito::Matcher;
    use serde_json::json;

    use super::{ChromaRetriever, DocsRetriever, EmbeddingClient, RetrievalError};

    fn retriever(url: &str) -> ChromaRetriever {
        let mut vector = AppConfig::default().vector;
        vector.url = url.to_string();
        vector.top_k = 2;
        let embeddings = EmbeddingClient::new(
            reqwest::Client::new(),
            url,
            "all-MiniLM-L6-v2",
            Some("sk-test".to_string().into()),
        );
        ChromaRetriever::new(&vector, embeddings, Duration::from_secs(5))
            .expect("retriever should build")
    }

    #[tokio::test]
    async fn query_maps_documents_and_metadata() {
        let mut server = mockito::Server::new_async().await;
        let embed = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({"input": ["oauth setup"]})))
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[0.1,0.2,0.3]}]}"#)
            .expect(2)
            .create_async()
            .await;
        let lookup = server
            .mock("GET", "/api/v1/collections/ngrok_docs")
            .with_status(200)
            .with_body(r#"{"id":"c-1","name":"ngrok_docs"}"#)
            .expect(1)
            .create_async()
            .await;
        let query = server
            .mock("POST", "/api/v1/collections/c-1/query")
            .match_body(Matcher::PartialJson(json!({"n_results": 2})))
            .with_status(200)
            .with_body(
                json!({
                    "ids": [["a", "b"]],
                    "documents": [[
                        "Enable OAuth.\n```yaml\non_http_request: []\n```",
                        "Untitled chunk"
                    ]],
                    "metadatas": [[
                        {"title": "OAuth", "source": "https://ngrok.com/docs/oauth"},
                        null
                    ]],
                    "distances": [[0.1, 0.4]]
                })
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let retriever = retriever(&server.url());
        let results = retriever.retrieve("oauth setup", 8).await.expect("query succeeds");
        retriever.retrieve("oauth setup", 8).await.expect("cached collection id");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "OAuth");
        assert_eq!(results[0].link, "https://ngrok.com/docs/oauth");
        assert_eq!(results[0].yaml_examples, vec!["on_http_request: []\n".to_string()]);
        assert!(results[0].score > 0.0);
        assert_eq!(results[1].title, "ngrok Documentation");
        assert!(results[1].link.is_empty());

        lookup.assert_async().await;
        query.assert_async().await;
        embed.assert_async().await;
    }

    #[tokio::test]
    async fn queries_top_k_and_keeps_at_most_max_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[0.5]}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/collections/ngrok_docs")
            .with_status(200)
            .with_body(r#"{"id":"c-9","name":"ngrok_docs"}"#)
            .create_async()
            .await;
        let query = server
            .mock("POST", "/api/v1/collections/c-9/query")
            .match_body(Matcher::PartialJson(json!({"n_results": 2})))
            .with_status(200)
            .with_body(
                json!({
                    "documents": [["Traffic policy basics", "Rate limiting"]],
                    "metadatas": [[{"title": "Traffic Policy"}, {"title": "Rate Limit"}]]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let results = retriever(&server.url()).retrieve("rate limit", 1).await.expect("query succeeds");

        query.assert_async().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Traffic Policy");
    }

    #[tokio::test]
    async fn missing_collection_is_a_vector_store_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[0.5]}]}"#)
            .create_async()
            .await;
        server.mock("GET", "/api/v1/collections/ngrok_docs").with_status(404).create_async().await;

        let error = retriever(&server.url()).retrieve("oauth", 5).await.expect_err("404");

        assert!(matches!(error, RetrievalError::VectorStore(ref message) if message.contains("ngrok_docs")));
    }

    #[tokio::test]
    async fn heartbeat_probe_reports_reachability() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/heartbeat")
            .with_status(200)
            .with_body(r#"{"nanosecond heartbeat":1}"#)
            .create_async()
            .await;

        let status = retriever(&server.url()).probe().await.expect("heartbeat ok");

        assert!(status.contains("ngrok_docs"));
    }

    #[tokio::test]
    async fn embedding_failures_surface() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/embeddings").with_status(500).with_body("boom").create_async().await;

        let error = retriever(&server.url()).retrieve("oauth", 5).await.expect_err("500");

        assert!(matches!(error, RetrievalError::Embedding(ref message) if message.contains("boom")));
        assert!(error.is_transient());
    }
}
