//! `pitwall` – racing engineer command line.
//!
//! This binary wires the snapshot provider and the insight agent together. It:
//!
//! 1. Checks for `~/.pitwall/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent and `chat` was requested from a terminal.
//! 2. Opens a session against the configured racing data source.
//! 3. `demo`: prints the three snapshots and the tool list, no API key needed.
//! 4. `serve`: answers snapshot requests as JSON over HTTP (see [`serve`]).
//! 5. `chat` (default): prints an initial analysis and drops the user into an
//!    **interactive REPL** (see [`repl`]).
//!
//! Ctrl-C during any source read or model call leaves cleanly (see
//! [`interrupt`]).

mod config;
mod interrupt;
mod repl;
mod serve;

use colored::Colorize;
use std::io::IsTerminal;
use std::process::ExitCode;

use pitwall_agent::InsightAgent;
use pitwall_telemetry::SnapshotProvider;
use pitwall_types::{PitwallError, Snapshot};

use crate::interrupt::interruptible;

/// What the user asked the binary to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Chat,
    Demo,
    Serve,
    Help,
}

fn parse_mode(arg: Option<&str>) -> Result<Mode, String> {
    match arg {
        None | Some("chat") => Ok(Mode::Chat),
        Some("demo") => Ok(Mode::Demo),
        Some("serve") => Ok(Mode::Serve),
        Some("help" | "-h" | "--help") => Ok(Mode::Help),
        Some(other) => Err(format!("unknown command '{other}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _tracing = pitwall_agent::init_tracing("pitwall");

    let arg = std::env::args().nth(1);
    let mode = match parse_mode(arg.as_deref()) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if mode == Mode::Help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    print_banner();

    // ── Configuration / First-Run Wizard ──────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) if mode == Mode::Chat && std::io::stdin().is_terminal() => {
            let mut cfg = run_first_run_wizard();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Ok(None) => config::defaults_with_env(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::defaults_with_env()
        }
    };

    let mut provider = SnapshotProvider::from_boxed(cfg.connector());

    match mode {
        Mode::Demo => {
            run_demo(&mut provider).await;
            ExitCode::SUCCESS
        }
        Mode::Serve => run_serve(cfg.serve_port, provider).await,
        Mode::Chat => run_chat(&cfg, &mut provider).await,
        Mode::Help => ExitCode::SUCCESS,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Modes
// ─────────────────────────────────────────────────────────────────────────────

async fn run_demo(provider: &mut SnapshotProvider) {
    let Some(mut session) = interruptible(provider.session()).await else {
        return;
    };
    print_source_status(session.is_live(), &session.source_description());

    let Some(info) = interruptible(session.racing_info()).await else {
        return;
    };
    for section in info.sections() {
        print_snapshot(section);
    }

    let Some(tools) = interruptible(session.available_tools()).await else {
        return;
    };
    println!("{}", "Available tools".bold().underline());
    if tools.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for tool in &tools {
        println!("  • {}", tool.bold());
    }
    println!();
}

async fn run_serve(port: u16, provider: SnapshotProvider) -> ExitCode {
    let listener = match serve::SnapshotServer::bind(port).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    println!(
        "  Serving snapshots from {} on {}",
        provider.source_description().bold(),
        format!("http://localhost:{port}/api/telemetry").bold().cyan()
    );
    println!("  Press {} to stop.\n", "Ctrl-C".bold());

    // Dropping the server future drops the provider, which disconnects.
    interruptible(serve::serve(serve::SnapshotServer::new(provider), listener)).await;
    ExitCode::SUCCESS
}

async fn run_chat(cfg: &config::Config, provider: &mut SnapshotProvider) -> ExitCode {
    let mut agent = match InsightAgent::new(cfg.agent_config()) {
        Ok(agent) => agent,
        Err(PitwallError::MissingCredential { variable }) => {
            eprintln!(
                "{} {} is not set. Export it or add `openai_api_key` to {}.",
                "Error:".red().bold(),
                variable.bold(),
                config::config_path().display()
            );
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let Some(mut session) = interruptible(provider.session()).await else {
        return ExitCode::SUCCESS;
    };
    print_source_status(session.is_live(), &session.source_description());
    println!("  Model: {}\n", agent.model().bold());

    println!("{}", "Initial analysis".bold().underline());
    let initial = interruptible(async {
        let info = session.racing_info().await;
        agent.analyze_situation(&info).await
    })
    .await;
    match initial {
        Some(Ok(text)) => println!("{}\n", text),
        Some(Err(e)) => println!("{}: {}\n", "Analysis failed".red(), e),
        None => return ExitCode::SUCCESS,
    }

    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());
    repl::run(&mut agent, &mut session).await;
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       Pitwall First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Pitwall.\n");

    let mut cfg = config::Config::default();

    // Racing data source
    println!("  Where should racing data come from?");
    println!("    1) Telemetry server next to the sim  (default)");
    println!("    2) Built-in simulated session");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    cfg.source = match choice.trim() {
        "2" => config::SourceKind::Sim,
        _ => config::SourceKind::Http,
    };

    if cfg.source == config::SourceKind::Http {
        cfg.server_url = prompt_line(
            &format!("  Telemetry server URL [{}]: ", cfg.server_url),
            &cfg.server_url,
        );
    }

    cfg.model = prompt_line(&format!("  Chat model [{}]: ", cfg.model), &cfg.model);

    if std::env::var(pitwall_agent::API_KEY_VAR).is_err() {
        cfg.openai_api_key = prompt_line(
            &format!("  OpenAI API key (blank to use ${}): ", pitwall_agent::API_KEY_VAR),
            "",
        );
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ____  _ __              ____"#.bold().cyan());
    println!("{}", r#"   / __ \(_) /__      __ _/ / /"#.bold().cyan());
    println!("{}", r#"  / /_/ / / __/ | /| / / _` / / "#.bold().cyan());
    println!("{}", r#" / ____/ / /_ | |/ |/ / (_| / /  "#.bold().cyan());
    println!("{}", r#"/_/   /_/\__/ |__/|__/\__,_/_/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Pitwall".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  AI race engineer");
    println!();
}

fn print_usage() {
    println!("{}", "Usage".bold().underline());
    println!("  pitwall {}   – live analysis and Q&A (default)", "chat".bold().cyan());
    println!("  pitwall {}   – print snapshots and tools, no API key needed", "demo".bold().cyan());
    println!("  pitwall {}  – JSON snapshots on /api/telemetry", "serve".bold().cyan());
    println!("  pitwall {}   – show this message", "help".bold().cyan());
}

fn print_source_status(live: bool, source: &str) {
    if live {
        println!("  Source {} {}", source.bold(), "connected".green());
    } else {
        println!(
            "  Source {} {}  {}",
            source.bold(),
            "unavailable".yellow(),
            "(all values will read unknown)".dimmed()
        );
    }
    println!();
}

pub(crate) fn print_snapshot(snapshot: &dyn Snapshot) {
    println!("{}", snapshot.title().bold().underline());
    for (key, value) in snapshot.entries() {
        let value = if value == pitwall_types::UNKNOWN {
            value.dimmed()
        } else {
            value.normal()
        };
        println!("  {:<26} {}", key.cyan(), value);
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_chat() {
        assert_eq!(parse_mode(None), Ok(Mode::Chat));
        assert_eq!(parse_mode(Some("chat")), Ok(Mode::Chat));
    }

    #[test]
    fn mode_parses_demo_serve_and_help() {
        assert_eq!(parse_mode(Some("demo")), Ok(Mode::Demo));
        assert_eq!(parse_mode(Some("serve")), Ok(Mode::Serve));
        assert_eq!(parse_mode(Some("--help")), Ok(Mode::Help));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(parse_mode(Some("race")).is_err());
    }
}
