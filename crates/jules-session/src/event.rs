//! Session events.
//!
//! Front ends subscribe to a [`ChatSession`](crate::ChatSession) instead of
//! polling it; every transcript or state change is published here.

use tokio::sync::broadcast;

use crate::message::MessageId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A message was pushed at `index`
    MessageAppended { index: usize },
    /// Placeholders of the pending exchange now carry server ids
    IdsConfirmed { user: MessageId, model: MessageId },
    /// Reply text appended to the in-flight message
    TextAppended { index: usize, text: String },
    /// Transcript cut down to `len` messages by a branch resubmission
    Truncated { len: usize },
    RequestStarted,
    /// Emitted on every exit path of a submit
    RequestFinished,
    BranchChanged { branch_point: Option<MessageId> },
    UploadStarted,
    UploadFinished,
    UploadStatusChanged,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current subscribers, returns how many received it.
    /// Having no subscriber is fine.
    pub fn publish(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
