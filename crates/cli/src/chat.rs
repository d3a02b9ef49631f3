//! `relaychat chat`: the interactive REPL.
//!
//! Each line is submitted to the session; fallback notices are printed as
//! they arrive and Ctrl+C cancels the in-flight run without leaving the
//! REPL.

use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use rc_dispatch::{CascadeEvent, ChatSession};
use rc_domain::config::ClientConfig;
use rc_domain::tier::find_tier;

use crate::context::build_session;
use crate::render::{event_notice, history_text, models_text, outcome_text};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(cfg: &ClientConfig, model: Option<&str>) -> anyhow::Result<()> {
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = build_session(cfg, model, Some(tx))?;

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".relaychat")
        .join("line_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("relaychat  |  model: {}", session.selected_tier().display_alias);
    eprintln!("Type /help for commands, Ctrl+C cancels a reply, Ctrl+D exits");
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    match parse_slash(trimmed) {
                        Slash::Exit => break,
                        other => run_slash(other, &session),
                    }
                    continue;
                }

                converse(&session, trimmed, &mut events).await;
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    Ok(())
}

/// Submit one message, showing progress and honoring Ctrl+C.
async fn converse(
    session: &ChatSession,
    text: &str,
    events: &mut mpsc::UnboundedReceiver<CascadeEvent>,
) {
    let submit = session.submit(text);
    tokio::pin!(submit);

    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            Some(event) = events.recv() => show_event(&event),
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        show_event(&event);
    }

    match outcome_text(&outcome) {
        Ok(reply) => println!("\n{reply}\n"),
        Err(notice) => eprintln!("{notice}"),
    }
}

fn show_event(event: &CascadeEvent) {
    if let Some(notice) = event_notice(event) {
        eprintln!("{notice}");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, PartialEq, Eq)]
pub enum Slash {
    New,
    /// `/model` alone shows the current tier.
    Model(Option<String>),
    Models,
    History,
    Help,
    Exit,
    Unknown(String),
}

pub fn parse_slash(input: &str) -> Slash {
    let mut parts = input.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    match cmd {
        "/new" | "/reset" => Slash::New,
        "/model" => Slash::Model(arg),
        "/models" => Slash::Models,
        "/history" => Slash::History,
        "/help" => Slash::Help,
        "/exit" | "/quit" => Slash::Exit,
        other => Slash::Unknown(other.to_owned()),
    }
}

fn run_slash(cmd: Slash, session: &ChatSession) {
    match cmd {
        Slash::New => {
            session.new_chat();
            eprintln!("Started a new chat.");
        }
        Slash::Model(None) => {
            let tier = session.selected_tier();
            eprintln!("Current model: {} ({})", tier.display_alias, tier.identifier);
            eprintln!("Usage: /model <index|id|alias>");
        }
        Slash::Model(Some(query)) => match find_tier(session.tiers(), &query) {
            Some(index) => match session.select_tier(index) {
                Ok(tier) => eprintln!("Model set to {} ({})", tier.display_alias, tier.identifier),
                Err(e) => eprintln!("{e}"),
            },
            None => eprintln!("Unknown model '{query}' (try /models)"),
        },
        Slash::Models => eprint!("{}", models_text(session.tiers(), session.selected_index())),
        Slash::History => print!("{}", history_text(&session.history())),
        Slash::Help => {
            eprintln!("Commands:");
            eprintln!("  /new             Forget the transcript and start over");
            eprintln!("  /model [name]    Show or switch the model tier");
            eprintln!("  /models          List model tiers in fallback order");
            eprintln!("  /history         Print the saved transcript");
            eprintln!("  /exit, /quit     Leave the chat");
            eprintln!("  /help            Show this help");
        }
        Slash::Unknown(other) => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
        Slash::Exit => {}
    }
}
