use serde::Serialize;

/// Structured trace events emitted across all relaychat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TierAttempt {
        run_id: String,
        tier: usize,
        model: String,
    },
    TierFallback {
        run_id: String,
        from_model: String,
        to_model: String,
        reason: String,
    },
    CascadeFinished {
        run_id: String,
        outcome: String,
        attempts: usize,
        duration_ms: u64,
    },
    TranscriptSaved {
        turns: usize,
        chars: usize,
        evicted: usize,
    },
    RelayForward {
        model: String,
        status: u16,
        duration_ms: u64,
    },
    RelayRejected {
        source: String,
        status: u16,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "rc_event");
    }
}
