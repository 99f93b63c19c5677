//! # Session Error Types

use thiserror::Error;

/// Errors raised by a [`ChatBackend`](crate::ChatBackend) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request never produced a response (connection refused, DNS, timeout, broken body)
    #[error("network error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The backend answered but the body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    #[error("config error: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether the backend received the request and answered it.
    pub fn responded(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Decode(_))
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// Violations of the reply framing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed identity frame: {0:?}")]
    MalformedIdentity(String),

    #[error("server assigned a placeholder id: {0}")]
    PlaceholderIdentity(String),

    #[error("server assigned an id already used in this session: {0}")]
    DuplicateIdentity(String),

    #[error("identity frame received after reply text")]
    LateIdentity,
}

/// Local upload validation failures. These never reach the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("unsupported file type: {mime}")]
    UnsupportedType { mime: String },

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

/// Session error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Only confirmed messages present in the transcript can be branched from
    #[error("message cannot be used as a branch point: {id}")]
    NotBranchable { id: String },

    #[error(transparent)]
    Validation(#[from] UploadRejection),
}

impl SessionError {
    pub fn not_branchable(id: impl Into<String>) -> Self {
        Self::NotBranchable { id: id.into() }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
