//! The chat session and its tier cascade.
//!
//! [`ChatSession::submit`] persists the user turn, then tries the selected
//! model tier and walks forward through the remaining tiers whenever one
//! reports it is out of capacity.  Each run owns a [`CancellationToken`];
//! starting a new run cancels the previous one.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rc_domain::config::ClientConfig;
use rc_domain::error::{Error, Result};
use rc_domain::trace::TraceEvent;
use rc_domain::wire::RelayRequest;
use rc_domain::{ModelTier, Role, Turn};
use rc_transcript::TranscriptStore;

use crate::classify::{classify, FailureKind};
use crate::normalize::extract_reply_text;
use crate::relay_client::RelayTransport;

/// Shown when every tier reported it is out of capacity.
pub const EXHAUSTED_NOTICE: &str =
    "All models are busy right now. Please wait a moment and try again.";

const GENERIC_FAILURE: &str = "Something went wrong while contacting the model. Please try again.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How a submitted turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    Succeeded { reply: String, tier: usize },
    /// The run was cancelled; no assistant turn was recorded.
    Cancelled,
    /// Every tier from the starting one onward was out of capacity.
    AllTiersExhausted { attempted: Vec<usize> },
    Failed { message: String },
}

impl CascadeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Cancelled => "cancelled",
            Self::AllTiersExhausted { .. } => "all_tiers_exhausted",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Progress notices for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeEvent {
    Attempting {
        tier: usize,
        model: String,
        alias: String,
    },
    FallingBack {
        from: usize,
        to: usize,
        alias: String,
        reason: String,
    },
}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub preset: String,
    pub default_tier: usize,
    pub backoff: Duration,
    pub max_contents: usize,
    /// Surface raw error messages instead of the generic one.
    pub debug: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            preset: cfg.preset.clone(),
            default_tier: cfg.default_tier,
            backoff: Duration::from_millis(cfg.backoff_ms),
            max_contents: cfg.max_contents,
            debug: cfg.debug,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ActiveRun {
    id: String,
    token: CancellationToken,
}

pub struct ChatSession {
    relay: Arc<dyn RelayTransport>,
    transcript: Arc<TranscriptStore>,
    tiers: Vec<ModelTier>,
    options: SessionOptions,
    selected: AtomicUsize,
    /// Guards run start-up and the assistant-turn commit.
    active: Mutex<Option<ActiveRun>>,
    events: Option<mpsc::UnboundedSender<CascadeEvent>>,
}

impl ChatSession {
    pub fn new(
        relay: Arc<dyn RelayTransport>,
        transcript: Arc<TranscriptStore>,
        tiers: Vec<ModelTier>,
        options: SessionOptions,
    ) -> Result<Self> {
        if tiers.is_empty() {
            return Err(Error::Config("at least one model tier is required".into()));
        }
        if options.default_tier >= tiers.len() {
            return Err(Error::Config(format!(
                "default tier {} out of range (have {})",
                options.default_tier,
                tiers.len()
            )));
        }
        Ok(Self {
            relay,
            transcript,
            selected: AtomicUsize::new(options.default_tier),
            tiers,
            options,
            active: Mutex::new(None),
            events: None,
        })
    }

    /// Deliver [`CascadeEvent`]s on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<CascadeEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn tiers(&self) -> &[ModelTier] {
        &self.tiers
    }

    pub fn selected_index(&self) -> usize {
        self.selected.load(Ordering::SeqCst)
    }

    pub fn selected_tier(&self) -> &ModelTier {
        &self.tiers[self.selected_index()]
    }

    pub fn select_tier(&self, index: usize) -> Result<&ModelTier> {
        let tier = self.tiers.get(index).ok_or_else(|| {
            Error::Other(format!(
                "no model tier {index} (choose 0..{})",
                self.tiers.len() - 1
            ))
        })?;
        self.selected.store(index, Ordering::SeqCst);
        Ok(tier)
    }

    pub fn history(&self) -> Vec<Turn> {
        self.transcript.load()
    }

    pub fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Cancel the in-flight run, if any.  Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.active.lock().take() {
            Some(run) => {
                tracing::debug!(run_id = %run.id, "cancelling run");
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel any in-flight run and forget the transcript.
    pub fn new_chat(&self) {
        let mut active = self.active.lock();
        if let Some(run) = active.take() {
            run.token.cancel();
        }
        self.transcript.clear();
    }

    // ── Cascade ──────────────────────────────────────────────────────

    /// Submit one user message and run the cascade to completion.
    pub async fn submit(&self, text: &str) -> CascadeOutcome {
        let text = text.trim();
        if text.is_empty() {
            return CascadeOutcome::Failed {
                message: "Message is empty.".into(),
            };
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let (token, working) = self.begin_run(&run_id, text);
        let tail_start = working.len().saturating_sub(self.options.max_contents);
        let payload = &working[tail_start..];

        let mut attempted = BTreeSet::new();
        let mut index = self.selected_index();

        let outcome = loop {
            attempted.insert(index);
            if index != self.selected_index() {
                self.selected.store(index, Ordering::SeqCst);
            }
            let tier = &self.tiers[index];

            TraceEvent::TierAttempt {
                run_id: run_id.clone(),
                tier: index,
                model: tier.identifier.clone(),
            }
            .emit();
            self.notify(CascadeEvent::Attempting {
                tier: index,
                model: tier.identifier.clone(),
                alias: tier.display_alias.clone(),
            });

            let request = RelayRequest::from_turns(
                payload,
                &tier.identifier,
                &self.options.preset,
                self.options.max_contents,
            );
            let sent = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = self.relay.send(&request) => Some(result),
            };
            let Some(result) = sent else {
                break CascadeOutcome::Cancelled;
            };

            let err = match result {
                Ok(raw) => {
                    let reply = extract_reply_text(&raw)
                        .map(|r| r.trim().to_owned())
                        .filter(|r| !r.is_empty());
                    let Some(reply) = reply else {
                        break CascadeOutcome::Failed {
                            message: "The model returned an empty reply.".into(),
                        };
                    };
                    if !self.commit_reply(&token, &reply) {
                        break CascadeOutcome::Cancelled;
                    }
                    break CascadeOutcome::Succeeded { reply, tier: index };
                }
                Err(err) => err,
            };

            if classify(&err) == FailureKind::Fatal {
                tracing::warn!(run_id = %run_id, model = %tier.identifier, error = %err, "attempt failed");
                break CascadeOutcome::Failed {
                    message: self.failure_message(&err),
                };
            }

            let Some(next) = next_untried(self.tiers.len(), index, &attempted) else {
                tracing::warn!(run_id = %run_id, model = %tier.identifier, "last tier out of capacity");
                break CascadeOutcome::AllTiersExhausted {
                    attempted: attempted.iter().copied().collect(),
                };
            };

            let reason = err.to_string();
            tracing::warn!(
                run_id = %run_id,
                from = %tier.identifier,
                to = %self.tiers[next].identifier,
                error = %reason,
                "tier out of capacity, falling back"
            );
            TraceEvent::TierFallback {
                run_id: run_id.clone(),
                from_model: tier.identifier.clone(),
                to_model: self.tiers[next].identifier.clone(),
                reason: reason.clone(),
            }
            .emit();
            self.notify(CascadeEvent::FallingBack {
                from: index,
                to: next,
                alias: self.tiers[next].display_alias.clone(),
                reason,
            });

            let cancelled = tokio::select! {
                biased;
                _ = token.cancelled() => true,
                _ = tokio::time::sleep(self.options.backoff) => false,
            };
            if cancelled {
                break CascadeOutcome::Cancelled;
            }
            index = next;
        };

        self.end_run(&run_id);
        TraceEvent::CascadeFinished {
            run_id,
            outcome: outcome.label().into(),
            attempts: attempted.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        outcome
    }

    /// Cancel the previous run, install a new token, and persist the user
    /// turn.  Returns the token and the working transcript.
    fn begin_run(&self, run_id: &str, text: &str) -> (CancellationToken, Vec<Turn>) {
        let token = CancellationToken::new();
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            tracing::debug!(previous = %previous.id, run_id = %run_id, "superseding in-flight run");
            previous.token.cancel();
        }
        *active = Some(ActiveRun {
            id: run_id.to_owned(),
            token: token.clone(),
        });

        let mut working = self.transcript.load();
        working.push(Turn::user(text));
        self.transcript.append(Role::User, text);
        (token, working)
    }

    /// Record the assistant turn unless the run was cancelled meanwhile.
    fn commit_reply(&self, token: &CancellationToken, reply: &str) -> bool {
        let _active = self.active.lock();
        if token.is_cancelled() {
            return false;
        }
        self.transcript.append(Role::Assistant, reply);
        true
    }

    fn end_run(&self, run_id: &str) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|run| run.id == run_id) {
            *active = None;
        }
    }

    fn failure_message(&self, err: &Error) -> String {
        match err {
            Error::Throttled { retry_after_secs } => {
                format!("Too many requests. Try again in {retry_after_secs}s.")
            }
            _ if self.options.debug => err.to_string(),
            _ => GENERIC_FAILURE.into(),
        }
    }

    fn notify(&self, event: CascadeEvent) {
        if let Some(tx) = &self.events {
            // The receiver may be gone; progress notices are best-effort.
            let _ = tx.send(event);
        }
    }
}

/// The next tier after `current` that this run has not tried yet.
fn next_untried(len: usize, current: usize, attempted: &BTreeSet<usize>) -> Option<usize> {
    (current + 1..len).find(|i| !attempted.contains(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_untried_walks_forward_without_wrapping() {
        let attempted: BTreeSet<usize> = [1, 2].into_iter().collect();
        assert_eq!(next_untried(5, 2, &attempted), Some(3));
        assert_eq!(next_untried(5, 4, &attempted), None);

        let all: BTreeSet<usize> = (0..5).collect();
        assert_eq!(next_untried(5, 0, &all), None);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(CascadeOutcome::Cancelled.label(), "cancelled");
        assert_eq!(
            CascadeOutcome::AllTiersExhausted { attempted: vec![0] }.label(),
            "all_tiers_exhausted"
        );
    }

    #[test]
    fn options_follow_client_config() {
        let opts = SessionOptions::default();
        assert_eq!(opts.backoff, Duration::from_millis(600));
        assert_eq!(opts.max_contents, 10);
        assert_eq!(opts.default_tier, 1);
        assert_eq!(opts.preset, "balanced");
    }
}
