//! The capped transcript over a [`KvStore`].
//!
//! The public API never fails: `load` degrades to an empty transcript and
//! `save` / `append` / `clear` log and swallow storage errors.  The `try_*`
//! variants expose the underlying [`Result`]s for callers (and tests) that
//! want them.

use std::sync::Arc;

use serde_json::Value;

use rc_domain::config::HistoryConfig;
use rc_domain::error::{Error, Result};
use rc_domain::trace::TraceEvent;
use rc_domain::{Role, Turn};

use crate::kv::{KvStore, MemoryKvStore};

pub struct TranscriptStore {
    kv: Arc<dyn KvStore>,
    key: String,
    limits: HistoryConfig,
}

impl TranscriptStore {
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>, limits: HistoryConfig) -> Self {
        Self {
            kv,
            key: key.into(),
            limits,
        }
    }

    /// A store backed by process memory with the default caps.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryKvStore::new()),
            "chat_history",
            HistoryConfig::default(),
        )
    }

    pub fn limits(&self) -> HistoryConfig {
        self.limits
    }

    // ── Never-failing public contract ─────────────────────────────────

    /// The persisted transcript, or an empty one if anything goes wrong.
    pub fn load(&self) -> Vec<Turn> {
        match self.try_load() {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "transcript unreadable, starting empty");
                Vec::new()
            }
        }
    }

    /// Append one turn and persist the capped result.
    pub fn append(&self, role: Role, text: &str) {
        let mut turns = self.load();
        turns.push(Turn::new(role, text));
        self.save(turns);
    }

    /// Append only when `text` is present.
    pub fn append_opt(&self, role: Role, text: Option<&str>) {
        if let Some(text) = text {
            self.append(role, text);
        }
    }

    /// Untyped append: a no-op unless `role` names a known role and `text`
    /// is present.
    pub fn append_raw(&self, role: &str, text: Option<&str>) {
        let Ok(parsed) = role.parse::<Role>() else {
            tracing::debug!(role = %role, "ignoring append with unknown role");
            return;
        };
        self.append_opt(parsed, text);
    }

    /// Enforce the caps and persist.
    pub fn save(&self, turns: Vec<Turn>) {
        if let Err(e) = self.try_save(turns) {
            tracing::warn!(key = %self.key, error = %e, "failed to persist transcript");
        }
    }

    /// Forget the persisted transcript.
    pub fn clear(&self) {
        if let Err(e) = self.try_clear() {
            tracing::warn!(key = %self.key, error = %e, "failed to clear transcript");
        }
    }

    // ── Fallible internals ────────────────────────────────────────────

    pub fn try_load(&self) -> Result<Vec<Turn>> {
        let Some(raw) = self.kv.get(&self.key)? else {
            return Ok(Vec::new());
        };
        let value: Value = serde_json::from_str(&raw)?;
        let Value::Array(records) = value else {
            return Err(Error::Storage("persisted transcript is not an array".into()));
        };
        Ok(records.iter().filter_map(parse_record).collect())
    }

    /// Persist `turns` after capping; returns what was written.
    pub fn try_save(&self, turns: Vec<Turn>) -> Result<Vec<Turn>> {
        let (turns, evicted) = enforce_caps(turns, &self.limits);
        let json = serde_json::to_string(&turns)?;
        self.kv.set(&self.key, &json)?;

        TraceEvent::TranscriptSaved {
            turns: turns.len(),
            chars: total_chars(&turns),
            evicted,
        }
        .emit();

        Ok(turns)
    }

    pub fn try_clear(&self) -> Result<()> {
        self.kv.remove(&self.key)
    }
}

/// Apply the message-count cap, then the character budget, evicting the
/// oldest turns first.  The character pass never removes the last turn, so a
/// single oversized turn survives on its own.  Returns the kept turns and
/// how many were evicted.
pub fn enforce_caps(mut turns: Vec<Turn>, limits: &HistoryConfig) -> (Vec<Turn>, usize) {
    let original = turns.len();

    if turns.len() > limits.max_messages {
        let excess = turns.len() - limits.max_messages;
        turns.drain(..excess);
    }

    let mut total = total_chars(&turns);
    while total > limits.max_chars && turns.len() > 1 {
        let oldest = turns.remove(0);
        total -= oldest.char_len();
    }

    let evicted = original - turns.len();
    (turns, evicted)
}

pub fn total_chars(turns: &[Turn]) -> usize {
    turns.iter().map(Turn::char_len).sum()
}

/// Records with an unknown role or a non-string text are dropped.
fn parse_record(record: &Value) -> Option<Turn> {
    let role = record.get("role")?.as_str()?.parse::<Role>().ok()?;
    let text = record.get("text")?.as_str()?;
    Some(Turn::new(role, text))
}
