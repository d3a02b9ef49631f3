use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// The role name used in the persisted transcript.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// The role name the upstream `generateContent` API expects.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known [`Role`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts both the transcript names and the wire name `model`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" | "model" => Ok(Role::Assistant),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    /// Build a turn, trimming surrounding whitespace from `text`.
    pub fn new(role: Role, text: impl AsRef<str>) -> Self {
        Self {
            role,
            text: text.as_ref().trim().to_owned(),
        }
    }

    pub fn user(text: impl AsRef<str>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl AsRef<str>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Length of the text in characters (Unicode scalar values).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_whitespace() {
        let turn = Turn::user("  hello there \n");
        assert_eq!(turn.text, "hello there");
        assert_eq!(turn.role, Role::User);
    }

    #[test]
    fn role_parses_transcript_and_wire_names() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("model".parse::<Role>().unwrap(), Role::Assistant);
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn wire_name_maps_assistant_to_model() {
        assert_eq!(Role::User.wire_name(), "user");
        assert_eq!(Role::Assistant.wire_name(), "model");
    }

    #[test]
    fn char_len_counts_scalars_not_bytes() {
        let turn = Turn::assistant("héllo");
        assert_eq!(turn.char_len(), 5);
        assert_eq!(turn.text.len(), 6);
    }

    #[test]
    fn serializes_as_role_text_record() {
        let json = serde_json::to_value(Turn::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "text": "hi"}));
    }
}
