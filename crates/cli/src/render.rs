//! Text shown to the user.

use std::fmt::Write as _;

use rc_dispatch::{CascadeEvent, CascadeOutcome, EXHAUSTED_NOTICE};
use rc_domain::{ModelTier, Role, Turn};

/// The status line for a cascade event.
pub fn event_notice(event: &CascadeEvent) -> Option<String> {
    match event {
        CascadeEvent::Attempting { .. } => None,
        CascadeEvent::FallingBack { alias, .. } => {
            Some(format!("Model busy, switching to {alias}..."))
        }
    }
}

/// What to print once a run ends.  `Ok` goes to stdout, `Err` to stderr.
pub fn outcome_text(outcome: &CascadeOutcome) -> Result<String, String> {
    match outcome {
        CascadeOutcome::Succeeded { reply, .. } => Ok(reply.clone()),
        CascadeOutcome::Cancelled => Err("(cancelled)".into()),
        CascadeOutcome::AllTiersExhausted { .. } => Err(EXHAUSTED_NOTICE.into()),
        CascadeOutcome::Failed { message } => Err(message.clone()),
    }
}

pub fn history_text(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "(no messages yet)\n".into();
    }
    let mut out = String::new();
    for turn in turns {
        let who = match turn.role {
            Role::User => "you",
            Role::Assistant => "model",
        };
        let _ = writeln!(out, "{who}> {}", turn.text);
    }
    out
}

pub fn models_text(tiers: &[ModelTier], selected: usize) -> String {
    let mut out = String::new();
    for (i, tier) in tiers.iter().enumerate() {
        let marker = if i == selected { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {i}  {:<16} {}",
            tier.display_alias, tier.identifier
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_domain::tier::default_tiers;

    #[test]
    fn fallback_events_become_notices() {
        let event = CascadeEvent::FallingBack {
            from: 1,
            to: 2,
            alias: "Flash-Lite".into(),
            reason: "429".into(),
        };
        assert_eq!(
            event_notice(&event).as_deref(),
            Some("Model busy, switching to Flash-Lite...")
        );
        let attempt = CascadeEvent::Attempting {
            tier: 0,
            model: "m".into(),
            alias: "M".into(),
        };
        assert!(event_notice(&attempt).is_none());
    }

    #[test]
    fn exhausted_outcome_explains_itself() {
        let text = outcome_text(
            &CascadeOutcome::AllTiersExhausted {
                attempted: vec![0, 1],
            },
        );
        assert_eq!(text, Err(EXHAUSTED_NOTICE.to_string()));
    }

    #[test]
    fn models_mark_the_selected_tier() {
        let text = models_text(&default_tiers(), 1);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("* 1  Flash"));
        assert!(lines[0].starts_with("  0  Pro"));
    }

    #[test]
    fn history_labels_roles() {
        let text = history_text(&[Turn::user("hi"), Turn::assistant("hello")]);
        assert_eq!(text, "you> hi\nmodel> hello\n");
        assert_eq!(history_text(&[]), "(no messages yet)\n");
    }
}
