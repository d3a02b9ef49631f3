//! The `relaychat` terminal client: an interactive REPL plus one-shot
//! subcommands over the dispatch session.

pub mod args;
pub mod chat;
pub mod commands;
pub mod context;
pub mod render;
