use chrono::{DateTime, Utc};
use std::fmt;

/// Id of the local greeting that opens every conversation.
pub const WELCOME_MESSAGE_ID: &str = "welcome";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
    /// Local status and error notices. Never transmitted to the provider.
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        }
    }

    /// Offset added to the submission time when deriving message ids so a
    /// user message and its model reply never share an id.
    fn id_offset(self) -> u64 {
        match self {
            Role::User | Role::System => 0,
            Role::Model => 1,
        }
    }

    pub fn is_model(self) -> bool {
        self == Role::Model
    }

    pub fn is_system(self) -> bool {
        self == Role::System
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            "system" => Ok(Role::System),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

/// Stable update key for a transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn welcome() -> Self {
        Self(WELCOME_MESSAGE_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out time-derived ids that stay unique within one conversation, even
/// when several messages are created within the same millisecond.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last_issued: Option<u64>,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, role: Role, submitted_at: DateTime<Utc>) -> MessageId {
        let millis = u64::try_from(submitted_at.timestamp_millis()).unwrap_or(0);
        let mut candidate = millis.saturating_add(role.id_offset());
        if let Some(last) = self.last_issued {
            if candidate <= last {
                candidate = last + 1;
            }
        }
        self.last_issued = Some(candidate);
        MessageId(candidate.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_streaming: bool,
}

impl Message {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_streaming: false,
        }
    }

    /// Empty model message that fragments are folded into.
    pub fn model_placeholder(id: MessageId) -> Self {
        Self {
            is_streaming: true,
            ..Self::new(id, Role::Model, String::new())
        }
    }

    pub fn is_model(&self) -> bool {
        self.role.is_model()
    }

    pub fn is_system(&self) -> bool {
        self.role.is_system()
    }
}
