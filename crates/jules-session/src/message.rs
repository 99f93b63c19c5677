use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix reserved for ids generated locally before the server confirms them.
pub const PLACEHOLDER_PREFIX: &str = "temp-";

/// Message identifier, either a local placeholder or a server-assigned id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh placeholder id for a message of the given role
    pub fn placeholder(role: Role) -> Self {
        Self(format!("{}{}-{}", PLACEHOLDER_PREFIX, role, Uuid::new_v4()))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    pub fn is_confirmed(&self) -> bool {
        !self.is_placeholder()
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

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// One entry of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    /// Text content; grows while a model reply streams in
    pub parts: String,
    pub created_at: DateTime<Utc>,
    /// True while this is the in-flight model message
    #[serde(default)]
    pub streaming: bool,
}

impl Message {
    /// Create a placeholder user message
    pub fn user(parts: impl Into<String>) -> Self {
        Self {
            id: MessageId::placeholder(Role::User),
            role: Role::User,
            parts: parts.into(),
            created_at: Utc::now(),
            streaming: false,
        }
    }

    /// Create the empty placeholder that accumulates a streamed reply
    pub fn model_placeholder() -> Self {
        Self {
            id: MessageId::placeholder(Role::Model),
            role: Role::Model,
            parts: String::new(),
            created_at: Utc::now(),
            streaming: true,
        }
    }

    /// Create a synthetic model message, e.g. a failure notice
    pub fn notice(parts: impl Into<String>) -> Self {
        Self {
            id: MessageId::placeholder(Role::Model),
            role: Role::Model,
            parts: parts.into(),
            created_at: Utc::now(),
            streaming: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.parts
    }

    /// Branch targets are only offered for confirmed ids
    pub fn is_branchable(&self) -> bool {
        self.id.is_confirmed()
    }
}
