use std::path::Path;
use std::time::Duration;

use docbot_agent::retrieval::retriever_from_config;
use docbot_core::config::AppConfig;
use serde::Serialize;

use crate::commands::{block_on, load_options, CommandResult, EXIT_CONFIG, EXIT_OK, EXIT_UPSTREAM};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool, config_path: Option<&Path>) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = exit_code(&report.checks);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config_path: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(load_options(config_path)) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_docs_backend(&config));
            checks.push(check_llm(&config));
            checks.push(check_zendesk(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in
                ["slack_token_readiness", "docs_backend", "llm_configuration", "zendesk_configuration"]
            {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn exit_code(checks: &[DoctorCheck]) -> u8 {
    let failed = |name: &str| {
        checks.iter().any(|check| check.name == name && check.status == CheckStatus::Fail)
    };
    if failed("config_validation") || failed("slack_token_readiness") {
        EXIT_CONFIG
    } else if failed("docs_backend") {
        EXIT_UPSTREAM
    } else {
        EXIT_OK
    }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    match config.slack.validate() {
        Ok(()) => DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Pass,
            details: format!("{} mode credentials present", config.slack.mode.as_str()),
        },
        Err(error) => DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_docs_backend(config: &AppConfig) -> DoctorCheck {
    let retriever = match retriever_from_config(config) {
        Ok(retriever) => retriever,
        Err(error) => {
            return DoctorCheck {
                name: "docs_backend",
                status: CheckStatus::Fail,
                details: format!("failed to construct docs backend: {error}"),
            };
        }
    };
    let backend = retriever.backend().as_str();

    let probe = block_on("doctor", async {
        let outcome = tokio::time::timeout(PROBE_TIMEOUT, retriever.probe()).await;
        retriever.close().await;
        outcome
    });

    let (status, details) = match probe {
        Ok(Ok(Ok(detail))) => (CheckStatus::Pass, format!("{backend}: {detail}")),
        Ok(Ok(Err(error))) => (CheckStatus::Fail, format!("{backend} probe failed: {error}")),
        Ok(Err(_)) => (
            CheckStatus::Fail,
            format!("{backend} probe timed out after {}s", PROBE_TIMEOUT.as_secs()),
        ),
        Err(_) => (CheckStatus::Fail, "failed to initialize async runtime".to_string()),
    };
    DoctorCheck { name: "docs_backend", status, details }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    let provider = config.llm.provider.as_str();
    if config.llm.is_enabled() {
        DoctorCheck {
            name: "llm_configuration",
            status: CheckStatus::Pass,
            details: format!(
                "{provider} at {} (answers: {}, yaml: {})",
                config.llm.effective_base_url(),
                config.llm.answer_model,
                config.llm.yaml_model
            ),
        }
    } else {
        DoctorCheck {
            name: "llm_configuration",
            status: CheckStatus::Skipped,
            details: format!(
                "{provider} has no api key; answers quote documentation and /ngrok-yaml is disabled"
            ),
        }
    }
}

fn check_zendesk(config: &AppConfig) -> DoctorCheck {
    match &config.support.zendesk_subdomain {
        Some(subdomain) if config.support.zendesk_configured() => DoctorCheck {
            name: "zendesk_configuration",
            status: CheckStatus::Pass,
            details: format!("tickets filed at https://{subdomain}.zendesk.com"),
        },
        _ => DoctorCheck {
            name: "zendesk_configuration",
            status: CheckStatus::Skipped,
            details: "ticket creation disabled; set ZENDESK_SUBDOMAIN, ZENDESK_EMAIL and ZENDESK_API_TOKEN"
                .to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use docbot_core::config::AppConfig;
    use secrecy::SecretString;

    use super::{check_llm, check_slack_tokens, check_zendesk, exit_code, CheckStatus, DoctorCheck};
    use crate::commands::{EXIT_CONFIG, EXIT_OK, EXIT_UPSTREAM};

    fn check(name: &'static str, status: CheckStatus) -> DoctorCheck {
        DoctorCheck { name, status, details: String::new() }
    }

    #[test]
    fn exit_code_prefers_configuration_failures() {
        assert_eq!(
            exit_code(&[check("config_validation", CheckStatus::Pass), check("docs_backend", CheckStatus::Fail)]),
            EXIT_UPSTREAM
        );
        assert_eq!(
            exit_code(&[
                check("slack_token_readiness", CheckStatus::Fail),
                check("docs_backend", CheckStatus::Fail)
            ]),
            EXIT_CONFIG
        );
        assert_eq!(exit_code(&[check("llm_configuration", CheckStatus::Skipped)]), EXIT_OK);
    }

    #[test]
    fn slack_check_reports_missing_bot_token() {
        let config = AppConfig::default();
        let check = check_slack_tokens(&config);
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.details.contains("slack.bot_token"));
    }

    #[test]
    fn optional_integrations_are_skipped_not_failed() {
        let mut config = AppConfig::default();
        config.llm.api_key = None;
        assert_eq!(check_llm(&config).status, CheckStatus::Skipped);
        assert_eq!(check_zendesk(&config).status, CheckStatus::Skipped);

        config.llm.api_key = Some(SecretString::from("sk-test"));
        config.support.zendesk_subdomain = Some("ngrok".to_owned());
        config.support.zendesk_email = Some("support@example.com".to_owned());
        config.support.zendesk_api_token = Some(SecretString::from("token"));
        assert_eq!(check_llm(&config).status, CheckStatus::Pass);
        let zendesk = check_zendesk(&config);
        assert_eq!(zendesk.status, CheckStatus::Pass);
        assert_eq!(zendesk.details, "tickets filed at https://ngrok.zendesk.com");
    }
}
