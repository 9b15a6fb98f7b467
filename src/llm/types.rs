//! Universal types for LLM interactions.
//!
//! These types isolate the conversation logic from the wire format of any one
//! completion endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ChatError;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ChatError::InvalidMessage(format!("unknown role '{}'", other))),
        }
    }
}

/// A single message in a conversation.
///
/// Messages are immutable once built; their identity is their position in the
/// conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Build a message from a loosely shaped JSON object.
    ///
    /// Both `role` and `content` must be present strings and the role must be
    /// one of `system`, `user` or `assistant`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ChatError> {
        let obj = value.as_object().ok_or_else(|| {
            ChatError::InvalidMessage("message must be an object with role and content".into())
        })?;

        let role = obj
            .get("role")
            .and_then(|r| r.as_str())
            .ok_or_else(|| ChatError::InvalidMessage("missing string field 'role'".into()))?;
        let content = obj
            .get("content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| ChatError::InvalidMessage("missing string field 'content'".into()))?;

        Ok(Self::new(role.parse()?, content))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Message::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Sampling parameters forwarded unchanged with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stop: Vec<String>,
    pub max_tokens: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
            max_tokens: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_json() {
        let msg = Message::from_json(&json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "hi");
    }

    #[test]
    fn test_message_missing_fields() {
        let missing_role = Message::from_json(&json!({"content": "hi"}));
        assert!(matches!(missing_role, Err(ChatError::InvalidMessage(_))));

        let missing_content = Message::from_json(&json!({"role": "user"}));
        assert!(matches!(missing_content, Err(ChatError::InvalidMessage(_))));

        let not_object = Message::from_json(&json!("user: hi"));
        assert!(matches!(not_object, Err(ChatError::InvalidMessage(_))));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = Message::from_json(&json!({"role": "tool", "content": "x"})).unwrap_err();
        assert!(err.to_string().contains("tool"));
    }

    #[test]
    fn test_message_deserialize_validates() {
        let ok: Message = serde_json::from_str(r#"{"role":"assistant","content":"done"}"#).unwrap();
        assert_eq!(ok, Message::assistant("done"));

        let bad = serde_json::from_str::<Message>(r#"{"role":"assistant"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let value = serde_json::to_value(Message::system("be brief")).unwrap();
        assert_eq!(value, json!({"role": "system", "content": "be brief"}));
    }
}
