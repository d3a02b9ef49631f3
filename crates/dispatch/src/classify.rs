//! Failure classification for the tier cascade.
//!
//! Only an answer from the relay can say a tier is out of capacity.
//! Transport failures end the run whatever their text contains.

use rc_domain::error::Error;

/// Relay statuses that mark a tier as out of capacity for now.
const CAPACITY_STATUSES: &[u16] = &[429, 503];

/// Substrings (matched case-insensitively) in a relay error message that
/// mark a tier as out of capacity for now.
const CAPACITY_SIGNALS: &[&str] = &[
    "resource_exhausted",
    "resource exhausted",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "quota",
    "overloaded",
    "too many requests",
    "unavailable",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The tier is rate-limited, over quota, or overloaded. Try the next one.
    CapacityExhausted,
    /// Anything else. The run ends.
    Fatal,
}

pub fn classify(err: &Error) -> FailureKind {
    match err {
        Error::Relay { status, message }
            if CAPACITY_STATUSES.contains(status) || is_capacity_signal(message) =>
        {
            FailureKind::CapacityExhausted
        }
        // `Throttled` is the relay's own per-source limit and applies to
        // every tier alike.
        _ => FailureKind::Fatal,
    }
}

pub fn is_capacity_signal(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    CAPACITY_SIGNALS.iter().any(|signal| lower.contains(signal))
}
