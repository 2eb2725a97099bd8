use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Value;

use crate::docs::{truncate_chars, DocResult, DEFAULT_DOC_TITLE, SNIPPET_MAX_CHARS};

fn yaml_fence() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```ya?ml[^\n]*\n(.*?)```").ok()).as_ref()
}

/// Bodies of every fenced `yaml`/`yml` block, in document order.
pub fn extract_yaml_blocks(markdown: &str) -> Vec<String> {
    let Some(pattern) = yaml_fence() else {
        return Vec::new();
    };
    pattern
        .captures_iter(markdown)
        .filter_map(|captures| captures.get(1).map(|body| body.as_str().to_owned()))
        .collect()
}

/// Normalises the search tool's output into doc results.
///
/// The tool may answer with an MCP-style `{"content": [{"type": "text", ...}]}`
/// object, a JSON array of result objects or strings, or plain text.
pub fn parse_search_results(raw: &str, max_results: usize) -> Vec<DocResult> {
    let data = match serde_json::from_str::<Value>(raw) {
        Ok(data) => data,
        Err(_) => return parse_doc_text(raw).into_iter().collect(),
    };

    match data {
        Value::Object(map) => match map.get("content") {
            Some(Value::Array(items)) => items
                .iter()
                .take(max_results)
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| parse_doc_text(item.get("text").and_then(Value::as_str)?))
                .collect(),
            Some(_) => parse_doc_text(raw).into_iter().collect(),
            None => Vec::new(),
        },
        Value::Array(items) => items
            .into_iter()
            .take(max_results)
            .filter_map(|item| match item {
                Value::Object(_) => serde_json::from_value::<DocResult>(item).ok(),
                Value::String(text) => parse_doc_text(&text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Parses a `Title:` / `Link:` / `Content:` text record. Unprefixed lines are
/// treated as content.
pub fn parse_doc_text(text: &str) -> Option<DocResult> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut title = String::new();
    let mut link = String::new();
    let mut content_lines = Vec::new();

    for line in trimmed.lines() {
        if line.starts_with("Title:") {
            title = line.replace("Title:", "").trim().to_owned();
        } else if line.starts_with("Link:") {
            link = line.replace("Link:", "").trim().to_owned();
        } else if line.starts_with("Content:") {
            content_lines.push(line.replace("Content:", "").trim().to_owned());
        } else {
            content_lines.push(line.to_owned());
        }
    }

    let content = content_lines.join("\n");
    let content = truncate_chars(content.trim(), SNIPPET_MAX_CHARS);
    let title = if title.is_empty() { DEFAULT_DOC_TITLE.to_owned() } else { title };

    Some(DocResult::new(title, link, content))
}

#[cfg(test)]
mod tests {
    use super::{extract_yaml_blocks, parse_doc_text, parse_search_results};

    #[test]
    fn doc_text_fields_are_extracted() {
        let doc = parse_doc_text(
            "Title: Basic Auth\nLink: https://ngrok.com/docs/basic-auth\nContent: Protect endpoints\nwith a password.",
        )
        .expect("doc should parse");

        assert_eq!(doc.title, "Basic Auth");
        assert_eq!(doc.link, "https://ngrok.com/docs/basic-auth");
        assert_eq!(doc.content, "Protect endpoints\nwith a password.");
    }

    #[test]
    fn doc_text_defaults_title_and_caps_content() {
        let doc = parse_doc_text(&"z".repeat(800)).expect("doc should parse");
        assert_eq!(doc.title, "ngrok Documentation");
        assert_eq!(doc.content.len(), 500);
        assert!(parse_doc_text("   \n  ").is_none());
    }

    #[test]
    fn mcp_content_envelope_keeps_only_text_items() {
        let raw = r#"{"content":[
            {"type":"text","text":"Title: OAuth\nLink: https://ngrok.com/docs/oauth\nContent: Providers"},
            {"type":"image","data":"..."},
            {"type":"text","text":"Title: OIDC\nLink: https://ngrok.com/docs/oidc"}
        ]}"#;

        let docs = parse_search_results(raw, 3);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "OAuth");
        assert_eq!(docs[1].link, "https://ngrok.com/docs/oidc");
    }

    #[test]
    fn json_scalars_yield_no_results() {
        assert!(parse_search_results(r#""Title: OAuth\nLink: https://ngrok.com/docs/oauth""#, 5).is_empty());
        assert!(parse_search_results("42", 5).is_empty());
        assert!(parse_search_results(r#"{"results": []}"#, 5).is_empty());
    }

    #[test]
    fn json_array_accepts_objects_and_strings() {
        let raw = r#"[
            {"title":"Rate limiting","link":"https://ngrok.com/docs/rate-limit","content":"limits"},
            "Title: IP restrictions\nLink: https://ngrok.com/docs/ip"
        ]"#;

        let docs = parse_search_results(raw, 5);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "limits");
        assert_eq!(docs[1].title, "IP restrictions");
    }

    #[test]
    fn max_results_limits_inspected_items() {
        let raw = r#"["Title: A", "Title: B", "Title: C"]"#;
        assert_eq!(parse_search_results(raw, 2).len(), 2);
    }

    #[test]
    fn plain_text_falls_back_to_record_parsing() {
        let docs = parse_search_results("Title: Webhooks\nVerify signatures", 3);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Verify signatures");
    }

    #[test]
    fn yaml_blocks_accept_yml_and_info_strings() {
        let markdown = "intro\n```yaml title=policy.yml\non_http_request: []\n```\ntext\n```yml\nversion: 3\n```\n```bash\nngrok http 80\n```";

        let blocks = extract_yaml_blocks(markdown);

        assert_eq!(blocks, vec!["on_http_request: []\n".to_string(), "version: 3\n".to_string()]);
    }
}
