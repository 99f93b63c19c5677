//! Seam between the session and the transport.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

use crate::error::{BackendError, SessionError};
use crate::frame::ReplyFrame;
use crate::message::MessageId;
use crate::upload::UploadFile;

/// Frames of a streamed reply, in arrival order
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<ReplyFrame, SessionError>> + Send>>;

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub session_id: String,
    /// Branch point, `null` for an ordinary continuation
    pub parent_message_id: Option<MessageId>,
}

/// Non-streaming reply body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedReply {
    pub reply: String,
    pub session_id: String,
}

/// What the backend answered with
pub enum ChatReply {
    Buffered(BufferedReply),
    Streamed(FrameStream),
}

impl fmt::Debug for ChatReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatReply::Buffered(reply) => f.debug_tuple("Buffered").field(reply).finish(),
            ChatReply::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// Transport used by [`ChatSession`](crate::ChatSession).
///
/// Implementations perform a single attempt per call and never retry.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a prompt. Resolves once response headers are in; a streamed body
    /// is then read frame by frame through the returned stream.
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError>;

    /// Upload one already validated file.
    async fn upload(&self, file: &UploadFile) -> Result<(), BackendError>;
}
