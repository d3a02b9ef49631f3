//! The JSON body the client posts to the relay.
//!
//! `contents` is forwarded upstream as-is; `metadata` is consumed by the
//! relay and never forwarded.

use serde::{Deserialize, Serialize};

use crate::turn::Turn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub contents: Vec<Content>,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// `"user"` or `"model"`.
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

impl RelayRequest {
    /// Build a request from the most recent `max_contents` turns.
    pub fn from_turns(turns: &[Turn], model: &str, preset: &str, max_contents: usize) -> Self {
        let start = turns.len().saturating_sub(max_contents);
        let contents = turns[start..]
            .iter()
            .map(|turn| Content {
                role: turn.role.wire_name().to_owned(),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        Self {
            contents,
            metadata: RequestMetadata {
                model: Some(model.to_owned()),
                preset: Some(preset.to_owned()),
            },
        }
    }
}
