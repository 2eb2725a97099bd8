use std::path::Path;

use docbot_agent::runtime::DocsAssistant;

use crate::commands::{block_on, load_config, CommandResult};

#[derive(Clone, Copy, Debug)]
enum OneShot<'a> {
    Ask(&'a str),
    Yaml(&'a str),
}

impl OneShot<'_> {
    fn command(&self) -> &'static str {
        match self {
            Self::Ask(_) => "ask",
            Self::Yaml(_) => "yaml",
        }
    }
}

pub fn run_ask(question: &str, config_path: Option<&Path>) -> CommandResult {
    one_shot(OneShot::Ask(question), config_path)
}

pub fn run_yaml(request: &str, config_path: Option<&Path>) -> CommandResult {
    one_shot(OneShot::Yaml(request), config_path)
}

fn one_shot(operation: OneShot<'_>, config_path: Option<&Path>) -> CommandResult {
    let command = operation.command();
    let config = match load_config(command, config_path) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let assistant = match DocsAssistant::connect(&config) {
        Ok(assistant) => assistant,
        Err(error) => return CommandResult::assistant_failure(command, &error),
    };

    let outcome = block_on(command, async {
        let answer = match operation {
            OneShot::Ask(question) => assistant.ask(question, None).await,
            OneShot::Yaml(request) => assistant.generate_yaml(request).await,
        };
        assistant.retriever().close().await;
        answer
    });

    match outcome {
        Ok(Ok(answer)) => CommandResult::text(answer),
        Ok(Err(error)) => CommandResult::assistant_failure(command, &error),
        Err(failure) => failure,
    }
}
