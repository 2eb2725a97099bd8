//! Documentation search results and the text heuristics around them.
//!
//! Everything here is pure: the MCP client and the vector retriever feed raw
//! search output in, and the assistant reads ranked [`DocResult`]s and the
//! rendered context back out.

pub mod context;
pub mod parse;
pub mod query;
pub mod ranking;

use serde::{Deserialize, Serialize};

pub use context::build_doc_context;
pub use parse::{extract_yaml_blocks, parse_doc_text, parse_search_results};
pub use query::{
    extract_keywords, retry_queries, search_queries, wants_kubernetes, QueryCategory,
};
pub use ranking::{is_kubernetes_doc, rank, score};

pub const DEFAULT_DOC_TITLE: &str = "ngrok Documentation";
pub const SNIPPET_MAX_CHARS: usize = 500;
pub const PAGE_CONTENT_MAX_CHARS: usize = 4000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocResult {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub yaml_examples: Vec<String>,
    #[serde(default)]
    pub score: f64,
}

fn default_title() -> String {
    DEFAULT_DOC_TITLE.to_string()
}

impl DocResult {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            content: content.into(),
            full_content: None,
            yaml_examples: Vec::new(),
            score: 0.0,
        }
    }

    /// Attaches a fetched markdown page: its head becomes the full content and
    /// its YAML fences become examples.
    pub fn enrich_with_page(&mut self, page: &str) {
        let yaml_examples = extract_yaml_blocks(page);
        if !yaml_examples.is_empty() {
            self.yaml_examples = yaml_examples;
        }
        self.full_content = Some(truncate_chars(page, PAGE_CONTENT_MAX_CHARS).to_string());
    }

    /// Best available body text: the enriched page when present.
    pub fn body(&self) -> &str {
        self.full_content.as_deref().unwrap_or(&self.content)
    }
}

/// Returns the longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
