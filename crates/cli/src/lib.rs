pub mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docbot_core::config::AppConfig;

use crate::commands::docs::DocsAction;

#[derive(Debug, Parser)]
#[command(
    name = "docbot",
    about = "ngrok docs bot operator CLI",
    long_about = "Check readiness, inspect configuration, ask the docs assistant from a terminal, and call the documentation MCP server directly.",
    after_help = "Examples:\n  docbot doctor --json\n  docbot ask how do I add oauth to an endpoint\n  docbot chat\n  docbot docs get docs/getting-started"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to docbot.toml (defaults to ./docbot.toml or ./config/docbot.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, Slack tokens, docs backend reachability, LLM and Zendesk setup")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Answer one question from the ngrok documentation")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "Question text")]
        question: Vec<String>,
    },
    #[command(about = "Generate an ngrok YAML configuration for a request")]
    Yaml {
        #[arg(required = true, num_args = 1.., help = "What the configuration should do")]
        request: Vec<String>,
    },
    #[command(about = "Interactive question loop against the documentation")]
    Chat,
    #[command(subcommand, about = "Call documentation MCP server operations directly")]
    Docs(DocsCommand),
}

#[derive(Debug, Subcommand)]
enum DocsCommand {
    #[command(about = "Fetch one document by path")]
    Get { path: String },
    #[command(about = "List the documentation catalog")]
    List,
    #[command(about = "Warm the server cache for the given paths")]
    Prefetch {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<String>,
    },
    #[command(about = "Show documentation cache status")]
    Cache,
    #[command(about = "List tools the MCP server advertises")]
    Tools,
}

impl From<DocsCommand> for DocsAction {
    fn from(command: DocsCommand) -> Self {
        match command {
            DocsCommand::Get { path } => Self::Get { path },
            DocsCommand::List => Self::List,
            DocsCommand::Prefetch { paths } => Self::Prefetch { paths },
            DocsCommand::Cache => Self::Cache,
            DocsCommand::Tools => Self::Tools,
        }
    }
}

pub fn run() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    // A config that fails to load is reported by the command itself.
    if let Ok(config) = AppConfig::load(commands::load_options(config_path)) {
        logging::init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Doctor { json } => commands::doctor::run(json, config_path),
        Command::Config => commands::config::run(config_path),
        Command::Ask { question } => commands::ask::run_ask(&question.join(" "), config_path),
        Command::Yaml { request } => commands::ask::run_yaml(&request.join(" "), config_path),
        Command::Chat => commands::chat::run(config_path),
        Command::Docs(command) => commands::docs::run(command.into(), config_path),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
