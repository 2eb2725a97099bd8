pub mod ask;
pub mod chat;
pub mod config;
pub mod docs;
pub mod doctor;

use std::future::Future;
use std::path::Path;

use docbot_agent::runtime::AssistantError;
use docbot_core::config::{AppConfig, ConfigError, LoadOptions};
use serde::Serialize;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_UPSTREAM: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: EXIT_OK, output: serialize_payload(payload) }
    }

    /// Raw text on stdout, for answers and catalog output.
    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: EXIT_OK, output: output.into() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn config_failure(command: &str, error: &ConfigError) -> Self {
        Self::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    }

    pub fn upstream_failure(command: &str, message: impl Into<String>) -> Self {
        Self::failure(command, "upstream", message, EXIT_UPSTREAM)
    }

    pub fn assistant_failure(command: &str, error: &AssistantError) -> Self {
        match error {
            AssistantError::Domain(error) => {
                Self::failure(command, "invalid_input", error.to_string(), EXIT_CONFIG)
            }
            AssistantError::LlmRequired => {
                Self::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
            }
            AssistantError::Retrieval(_) | AssistantError::Llm(_) => {
                Self::upstream_failure(command, error.to_string())
            }
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Operator commands never need Slack credentials.
pub fn load_options(config_path: Option<&Path>) -> LoadOptions {
    LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        slack_optional: true,
        ..LoadOptions::default()
    }
}

pub fn load_config(command: &str, config_path: Option<&Path>) -> Result<AppConfig, CommandResult> {
    AppConfig::load(load_options(config_path))
        .map_err(|error| CommandResult::config_failure(command, &error))
}

/// Commands are synchronous entry points; each drives its own runtime.
pub fn block_on<F: Future>(command: &str, future: F) -> Result<F::Output, CommandResult> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| {
            CommandResult::failure(
                command,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_UPSTREAM,
            )
        },
    )?;
    Ok(runtime.block_on(future))
}
