use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docbot_core::config::AppConfig;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_options, CommandResult};

/// One rendered setting: dotted key, display value, env vars checked in order.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match AppConfig::load(load_options(config_path)) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", &error),
    };

    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source =
            field_source(field.key, field.env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::text(lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new("slack.mode", config.slack.mode.as_str(), &["DOCBOT_SLACK_MODE"]),
        Field::new(
            "slack.app_token",
            redact_token(config.slack.app_token.expose_secret()),
            &["DOCBOT_SLACK_APP_TOKEN", "SLACK_APP_TOKEN"],
        ),
        Field::new(
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            &["DOCBOT_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"],
        ),
        Field::new(
            "slack.signing_secret",
            redact_secret(config.slack.signing_secret.as_ref()),
            &["DOCBOT_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET"],
        ),
        Field::new("docs.backend", config.docs.backend.as_str(), &["DOCBOT_DOCS_BACKEND"]),
        Field::new("docs.mcp_url", config.docs.mcp_url.clone(), &["DOCBOT_DOCS_MCP_URL"]),
        Field::new("docs.search_tool", config.docs.search_tool.clone(), &["DOCBOT_DOCS_SEARCH_TOOL"]),
        Field::new("docs.fetch_tool", config.docs.fetch_tool.clone(), &[]),
        Field::new("docs.list_tool", config.docs.list_tool.clone(), &[]),
        Field::new("docs.prefetch_tool", config.docs.prefetch_tool.clone(), &[]),
        Field::new("docs.cache_status_tool", config.docs.cache_status_tool.clone(), &[]),
        Field::new(
            "docs.max_results",
            config.docs.max_results.to_string(),
            &["DOCBOT_DOCS_MAX_RESULTS"],
        ),
        Field::new(
            "docs.request_timeout_secs",
            config.docs.request_timeout_secs.to_string(),
            &["DOCBOT_DOCS_REQUEST_TIMEOUT_SECS"],
        ),
        Field::new(
            "docs.enrich_pages",
            config.docs.enrich_pages.to_string(),
            &["DOCBOT_DOCS_ENRICH_PAGES"],
        ),
        Field::new(
            "docs.min_relevance_score",
            config
                .docs
                .min_relevance_score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
            &["DOCBOT_DOCS_MIN_RELEVANCE_SCORE"],
        ),
        Field::new("vector.url", config.vector.url.clone(), &["DOCBOT_VECTOR_URL"]),
        Field::new("vector.collection", config.vector.collection.clone(), &["DOCBOT_VECTOR_COLLECTION"]),
        Field::new("vector.top_k", config.vector.top_k.to_string(), &["DOCBOT_VECTOR_TOP_K"]),
        Field::new(
            "vector.embedding_model",
            config.vector.embedding_model.clone(),
            &["DOCBOT_VECTOR_EMBEDDING_MODEL"],
        ),
        Field::new("llm.provider", config.llm.provider.as_str(), &["DOCBOT_LLM_PROVIDER"]),
        Field::new(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["DOCBOT_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        Field::new(
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["DOCBOT_LLM_BASE_URL"],
        ),
        Field::new("llm.answer_model", config.llm.answer_model.clone(), &["DOCBOT_LLM_ANSWER_MODEL"]),
        Field::new("llm.yaml_model", config.llm.yaml_model.clone(), &["DOCBOT_LLM_YAML_MODEL"]),
        Field::new(
            "support.zendesk_subdomain",
            config.support.zendesk_subdomain.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["DOCBOT_ZENDESK_SUBDOMAIN", "ZENDESK_SUBDOMAIN"],
        ),
        Field::new(
            "support.zendesk_email",
            config.support.zendesk_email.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["DOCBOT_ZENDESK_EMAIL", "ZENDESK_EMAIL"],
        ),
        Field::new(
            "support.zendesk_api_token",
            redact_secret(config.support.zendesk_api_token.as_ref()),
            &["DOCBOT_ZENDESK_API_TOKEN", "ZENDESK_API_TOKEN"],
        ),
        Field::new("support.tags", config.support.tags.join(","), &["DOCBOT_SUPPORT_TAGS"]),
        Field::new(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["DOCBOT_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["DOCBOT_SERVER_PORT", "PORT"]),
        Field::new(
            "logging.level",
            config.logging.level.clone(),
            &["DOCBOT_LOGGING_LEVEL", "DOCBOT_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["DOCBOT_LOGGING_FORMAT", "DOCBOT_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("docbot.toml"), PathBuf::from("config/docbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(value) if !value.expose_secret().trim().is_empty() => "<redacted>",
        _ => "<unset>",
    }
}
