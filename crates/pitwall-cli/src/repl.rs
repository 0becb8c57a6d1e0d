//! REPL – Read-Eval-Print Loop for the chat session.
//!
//! Free text is sent to the agent as a question about the current snapshot.
//! Supported slash-commands:
//!   /analyze      – fresh strategic analysis
//!   /situation    – print the race situation
//!   /telemetry    – print vehicle telemetry
//!   /track        – print track information
//!   /tools        – list the data source's tools
//!   /history      – show the conversation so far
//!   /help         – show this list
//!   /quit | /exit – leave the session
//!
//! Ctrl-C while a command is running abandons it and leaves the REPL.

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use pitwall_agent::{InsightAgent, Role};
use pitwall_telemetry::Session;

use crate::interrupt::interruptible;
use crate::print_snapshot;

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Analyze,
    Situation,
    Telemetry,
    Track,
    Tools,
    History,
    Help,
    Quit,
    Ask(String),
    Unknown(String),
    Empty,
}

fn parse(line: &str) -> Command {
    let line = line.trim();
    match line {
        "" => Command::Empty,
        "/analyze" => Command::Analyze,
        "/situation" => Command::Situation,
        "/telemetry" => Command::Telemetry,
        "/track" => Command::Track,
        "/tools" => Command::Tools,
        "/history" => Command::History,
        "/help" => Command::Help,
        "/quit" | "/exit" | "quit" | "exit" | "q" => Command::Quit,
        other if other.starts_with('/') => Command::Unknown(other.to_string()),
        other => Command::Ask(other.to_string()),
    }
}

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Entry point for the interactive REPL.
///
/// Returns on `/quit`, EOF, or Ctrl-C either at the prompt or while a
/// command is running; the caller's session guard then disconnects the
/// source.
pub async fn run(agent: &mut InsightAgent, session: &mut Session<'_>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };

    loop {
        let prompt = format!("{} ", "pitwall>".bold().cyan());
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        let command = parse(&line);
        if !matches!(command, Command::Empty)
            && let Err(e) = editor.add_history_entry(line.trim())
        {
            warn!(error = %e, "could not record line history");
        }

        match interruptible(dispatch(command, agent, session)).await {
            Some(Flow::Continue) => {}
            Some(Flow::Quit) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            None => break,
        }
    }
}

async fn dispatch(command: Command, agent: &mut InsightAgent, session: &mut Session<'_>) -> Flow {
    match command {
        Command::Empty => {}
        Command::Analyze => {
            let info = session.racing_info().await;
            print_reply(agent.analyze_situation(&info).await);
        }
        Command::Ask(question) => {
            let info = session.racing_info().await;
            print_reply(agent.ask_question(&question, &info).await);
        }
        Command::Situation => print_snapshot(&session.race_situation().await),
        Command::Telemetry => print_snapshot(&session.vehicle_telemetry().await),
        Command::Track => print_snapshot(&session.track_info().await),
        Command::Tools => cmd_tools(session).await,
        Command::History => cmd_history(agent),
        Command::Help => cmd_help(),
        Command::Quit => return Flow::Quit,
        Command::Unknown(other) => {
            println!(
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "/help".bold()
            );
        }
    }
    Flow::Continue
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn print_reply(reply: Result<String, pitwall_types::PitwallError>) {
    match reply {
        Ok(text) => println!("\n{}\n", text),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

async fn cmd_tools(session: &mut Session<'_>) {
    let tools = session.available_tools().await;
    println!("{}", "Available tools".bold().underline());
    if tools.is_empty() {
        println!("  {}", "none (source unavailable)".dimmed());
    }
    for tool in &tools {
        println!("  • {}", tool.bold());
    }
}

fn cmd_history(agent: &InsightAgent) {
    let history = agent.history();
    if history.is_empty() {
        println!("  {}", "No conversation yet.".dimmed());
        return;
    }
    for message in history {
        let label = match message.role {
            Role::User => "you".bold().cyan(),
            Role::Assistant => "engineer".bold().green(),
            Role::System => "system".bold().dimmed(),
        };
        println!("{}: {}\n", label, message.content);
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Pitwall Commands".bold().underline());
    println!("  {}     – ask about the current situation", "<question>".bold().cyan());
    println!("  {}     – fresh strategic analysis", "/analyze".bold().cyan());
    println!("  {}   – race situation snapshot", "/situation".bold().cyan());
    println!("  {}   – vehicle telemetry snapshot", "/telemetry".bold().cyan());
    println!("  {}       – track information snapshot", "/track".bold().cyan());
    println!("  {}       – data source tools", "/tools".bold().cyan());
    println!("  {}     – conversation so far", "/history".bold().cyan());
    println!("  {}  – leave the session", "/quit  /exit".bold().cyan());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_text_becomes_a_question() {
        assert_eq!(
            parse("  should I pit now? "),
            Command::Ask("should I pit now?".to_string())
        );
    }

    #[test]
    fn every_quit_spelling_quits() {
        for word in ["/quit", "/exit", "quit", "exit", "q"] {
            assert_eq!(parse(word), Command::Quit, "{word}");
        }
    }

    #[test]
    fn slash_commands_are_recognised() {
        assert_eq!(parse("/analyze"), Command::Analyze);
        assert_eq!(parse("/situation"), Command::Situation);
        assert_eq!(parse("/telemetry"), Command::Telemetry);
        assert_eq!(parse("/track"), Command::Track);
        assert_eq!(parse("/tools"), Command::Tools);
        assert_eq!(parse("/history"), Command::History);
        assert_eq!(parse("/help"), Command::Help);
    }

    #[test]
    fn unknown_slash_command_is_not_sent_to_the_model() {
        assert_eq!(parse("/pit"), Command::Unknown("/pit".to_string()));
    }

    #[tokio::test]
    async fn dispatch_keeps_going_until_quit() {
        use pitwall_agent::{AgentConfig, CompletionBackend, CompletionRequest, LlmError};
        use pitwall_telemetry::{SimConnector, SnapshotProvider};

        struct Canned;

        #[async_trait::async_trait]
        impl CompletionBackend for Canned {
            async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, LlmError> {
                Ok("Box this lap.".to_string())
            }
        }

        let config = AgentConfig::new("gpt-4", Some("sk-test".into()));
        let mut agent = InsightAgent::with_backend(config, Canned).unwrap();
        let mut provider = SnapshotProvider::new(SimConnector::demo());
        let mut session = provider.session().await;

        let ask = Command::Ask("tyres?".to_string());
        assert_eq!(dispatch(ask, &mut agent, &mut session).await, Flow::Continue);
        assert_eq!(dispatch(Command::Track, &mut agent, &mut session).await, Flow::Continue);
        assert_eq!(agent.history().len(), 2);
        assert_eq!(dispatch(Command::Quit, &mut agent, &mut session).await, Flow::Quit);
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse("   "), Command::Empty);
    }
}
