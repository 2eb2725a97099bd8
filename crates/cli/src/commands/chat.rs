use std::path::Path;

use async_trait::async_trait;
use docbot_agent::runtime::DocsAssistant;
use docbot_mcp::DocsClient;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::commands::{block_on, load_config, CommandResult};

const RULE: &str = "================================================================================";
const PROMPT: &str = "\nYour question: ";
const FAREWELL: &str = "\nThanks for using the ngrok documentation bot!";
const HELP: &str = "\nCommands:
  - ask any question about ngrok
  - list   list available docs
  - cache  show cache status
  - tools  list MCP tools
  - exit or quit to stop";

/// What the REPL needs from the docs stack.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, String>;
    async fn list_docs(&self) -> Result<Vec<String>, String>;
    async fn cache_status(&self) -> Result<String, String>;
    async fn list_tools(&self) -> Result<Vec<String>, String>;
}

pub struct LiveChat {
    assistant: DocsAssistant,
    docs: DocsClient,
}

#[async_trait]
impl ChatBackend for LiveChat {
    async fn ask(&self, question: &str) -> Result<String, String> {
        self.assistant.ask(question, None).await.map_err(|error| error.to_string())
    }

    async fn list_docs(&self) -> Result<Vec<String>, String> {
        self.docs.list_docs().await.map_err(|error| error.to_string())
    }

    async fn cache_status(&self) -> Result<String, String> {
        self.docs.cache_status().await.map_err(|error| error.to_string())
    }

    async fn list_tools(&self) -> Result<Vec<String>, String> {
        self.docs.list_tools().await.map_err(|error| error.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Exit,
    Help,
    List,
    Cache,
    Tools,
    Question(&'a str),
}

fn classify(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "" => ChatInput::Empty,
        "exit" | "quit" | "q" | "bye" => ChatInput::Exit,
        "help" | "?" => ChatInput::Help,
        "list" => ChatInput::List,
        "cache" => ChatInput::Cache,
        "tools" => ChatInput::Tools,
        _ => ChatInput::Question(trimmed),
    }
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match load_config("chat", config_path) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let assistant = match DocsAssistant::connect(&config) {
        Ok(assistant) => assistant,
        Err(error) => return CommandResult::assistant_failure("chat", &error),
    };
    let docs = match DocsClient::from_config(&config.docs) {
        Ok(docs) => docs,
        Err(error) => return CommandResult::upstream_failure("chat", format!("Error: {error}")),
    };
    let backend = LiveChat { assistant, docs };

    let outcome = block_on("chat", async {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let result = repl(&backend, stdin, tokio::io::stdout()).await;
        backend.docs.disconnect().await;
        backend.assistant.retriever().close().await;
        result
    });

    match outcome {
        Ok(Ok(())) => CommandResult::text(""),
        Ok(Err(error)) => CommandResult::failure("chat", "io", error.to_string(), 1),
        Err(failure) => failure,
    }
}

/// Reads questions line by line until an exit word or end of input.
pub async fn repl<B, R, W>(backend: &B, mut input: R, mut output: W) -> std::io::Result<()>
where
    B: ChatBackend + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_line(&mut output, &banner(backend).await).await?;

    let mut line = String::new();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            write_line(&mut output, FAREWELL).await?;
            return Ok(());
        }

        let reply = match classify(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => {
                write_line(&mut output, FAREWELL).await?;
                return Ok(());
            }
            ChatInput::Help => HELP.to_owned(),
            ChatInput::List => match backend.list_docs().await {
                Ok(docs) => format!("\nAvailable documentation:\n{}", docs.join("\n")),
                Err(error) => format!("\nError: {error}"),
            },
            ChatInput::Cache => match backend.cache_status().await {
                Ok(status) => format!("\nCache status:\n{status}"),
                Err(error) => format!("\nError: {error}"),
            },
            ChatInput::Tools => match backend.list_tools().await {
                Ok(tools) => format!("\nAvailable tools: {}", tools.join(", ")),
                Err(error) => format!("\nError: {error}"),
            },
            ChatInput::Question(question) => {
                write_line(&mut output, "\nSearching ngrok docs...").await?;
                match backend.ask(question).await {
                    Ok(answer) => format!("\n{RULE}\n{answer}\n{RULE}"),
                    Err(error) => format!("\nError: {error}"),
                }
            }
        };
        write_line(&mut output, &reply).await?;
    }
}

async fn banner<B: ChatBackend + ?Sized>(backend: &B) -> String {
    let tools = match backend.list_tools().await {
        Ok(tools) => format!("Connected! Available tools: {}", tools.join(", ")),
        Err(error) => format!("Docs server not reachable yet: {error}"),
    };
    format!(
        "{tools}\n\n{RULE}\nngrok Documentation Bot - CLI mode\n{RULE}\n\n\
         Ask me anything about ngrok! Type 'exit' or 'quit' to stop, 'help' for commands."
    )
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{classify, repl, ChatBackend, ChatInput};

    #[derive(Default)]
    struct ScriptedBackend {
        questions: Mutex<Vec<String>>,
        fail_cache: bool,
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn ask(&self, question: &str) -> Result<String, String> {
            self.questions.lock().expect("questions lock").push(question.to_owned());
            Ok(format!("answer to {question}"))
        }

        async fn list_docs(&self) -> Result<Vec<String>, String> {
            Ok(vec!["docs/getting-started".to_owned(), "docs/traffic-policy".to_owned()])
        }

        async fn cache_status(&self) -> Result<String, String> {
            if self.fail_cache {
                Err("tool `NgrokDocsCacheStatus` reported an error: boom".to_owned())
            } else {
                Ok("cached: 12".to_owned())
            }
        }

        async fn list_tools(&self) -> Result<Vec<String>, String> {
            Ok(vec!["SearchNgrokDocumentation".to_owned(), "ListNgrokDocs".to_owned()])
        }
    }

    async fn session(backend: &ScriptedBackend, input: &str) -> String {
        let mut output = Vec::new();
        repl(backend, input.as_bytes(), &mut output).await.expect("repl runs");
        String::from_utf8(output).expect("utf8 transcript")
    }

    #[test]
    fn classifies_special_words_case_insensitively() {
        assert_eq!(classify("  EXIT \n"), ChatInput::Exit);
        assert_eq!(classify("bye"), ChatInput::Exit);
        assert_eq!(classify("?"), ChatInput::Help);
        assert_eq!(classify("Tools"), ChatInput::Tools);
        assert_eq!(classify("   "), ChatInput::Empty);
        assert_eq!(classify(" how do I use oauth? \n"), ChatInput::Question("how do I use oauth?"));
    }

    #[tokio::test]
    async fn answers_questions_until_exit() {
        let backend = ScriptedBackend::default();
        let transcript = session(&backend, "what is ngrok?\n\nquit\nnever asked\n").await;

        assert!(transcript.contains("Connected! Available tools: SearchNgrokDocumentation, ListNgrokDocs"));
        assert!(transcript.contains("answer to what is ngrok?"));
        assert!(transcript.trim_end().ends_with("Thanks for using the ngrok documentation bot!"));
        assert_eq!(*backend.questions.lock().expect("questions lock"), vec!["what is ngrok?"]);
    }

    #[tokio::test]
    async fn catalog_commands_and_errors_render_inline() {
        let backend = ScriptedBackend { fail_cache: true, ..ScriptedBackend::default() };
        let transcript = session(&backend, "list\ncache\nhelp\n").await;

        assert!(transcript.contains("Available documentation:\ndocs/getting-started\ndocs/traffic-policy"));
        assert!(transcript.contains("Error: tool `NgrokDocsCacheStatus` reported an error: boom"));
        assert!(transcript.contains("list   list available docs"));
        assert!(backend.questions.lock().expect("questions lock").is_empty());
    }
}
