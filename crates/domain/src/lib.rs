//! Shared types for the relaychat workspace: conversation turns, model
//! tiers, configuration, the common error type, and structured trace events.

pub mod config;
pub mod error;
pub mod tier;
pub mod trace;
pub mod turn;
pub mod wire;

pub use error::{Error, Result};
pub use tier::ModelTier;
pub use turn::{Role, Turn};
