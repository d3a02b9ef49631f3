use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One candidate backend model.  A tier's rank is its position in the
/// configured list: index 0 is the most capable and least available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTier {
    /// Model identifier sent to the relay (e.g. `gemini-2.5-flash`).
    #[serde(rename = "id")]
    pub identifier: String,
    /// Human-readable label shown in the client.
    #[serde(rename = "alias")]
    pub display_alias: String,
}

impl ModelTier {
    pub fn new(identifier: impl Into<String>, display_alias: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_alias: display_alias.into(),
        }
    }
}

/// The built-in tier list, ordered from highest capability to highest
/// availability.
pub fn default_tiers() -> Vec<ModelTier> {
    vec![
        ModelTier::new("gemini-2.5-pro", "Pro"),
        ModelTier::new("gemini-2.5-flash", "Flash"),
        ModelTier::new("gemini-2.5-flash-lite", "Flash-Lite"),
        ModelTier::new("gemini-2.0-flash", "Flash 2.0"),
        ModelTier::new("gemini-2.0-flash-lite", "Flash-Lite 2.0"),
    ]
}

/// Resolve a user-supplied tier reference: a zero-based index, a model
/// identifier, or a display alias (case-insensitive).
pub fn find_tier(tiers: &[ModelTier], query: &str) -> Option<usize> {
    let query = query.trim();
    if let Ok(idx) = query.parse::<usize>() {
        return (idx < tiers.len()).then_some(idx);
    }
    tiers.iter().position(|t| {
        t.identifier.eq_ignore_ascii_case(query) || t.display_alias.eq_ignore_ascii_case(query)
    })
}

/// Whether `id` is safe to splice into an upstream model URL path.
pub fn is_valid_model_id(id: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static model id pattern"));
    re.is_match(id)
}
