//! Bounded, persisted conversation transcript.
//!
//! The transcript is stored as one JSON array under a single key of a
//! [`KvStore`].  Every save enforces the message-count and character caps,
//! and every public operation absorbs storage failures so a broken store
//! degrades to an empty conversation instead of an error.

pub mod kv;
pub mod store;

pub use kv::{FileKvStore, KvStore, MemoryKvStore};
pub use store::TranscriptStore;
