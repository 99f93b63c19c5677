//! Chat session manager.
//!
//! Owns the transcript, the pending-request lifecycle, streamed reply
//! assembly and the branch point. The state sits behind a mutex that is never
//! held across an await, so a session can be cloned into spawned tasks.

use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::backend::{ChatBackend, ChatReply, ChatRequest, FrameStream};
use crate::error::{ProtocolError, SessionError, SessionResult, UploadRejection};
use crate::event::{EventBus, SessionEvent};
use crate::frame::ReplyFrame;
use crate::message::{Message, MessageId};
use crate::notice::Locale;
use crate::upload::{BannerKind, StatusBanner, UploadFile, UploadPolicy};
use crate::BackendError;

/// Session construction options
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub locale: Locale,
    pub upload: UploadPolicy,
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            upload: UploadPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl SessionOptions {
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload = policy;
        self
    }
}

/// Why an operation was refused without touching the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyPrompt,
    RequestInFlight,
    UploadInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Reply fully received; ids are the final ids of the exchange
    Completed { user: MessageId, model: MessageId },
    /// The request failed; a failure notice was appended to the transcript
    Failed(SessionError),
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// Failed local validation, nothing was sent
    Invalid(UploadRejection),
    Failed(BackendError),
    Rejected(Rejection),
}

#[derive(Debug, Default)]
struct SessionState {
    messages: Vec<Message>,
    branch_point: Option<MessageId>,
    draft: String,
    request_in_flight: bool,
    upload_in_flight: bool,
    upload_status: Option<StatusBanner>,
}

impl SessionState {
    fn busy(&self) -> Option<Rejection> {
        if self.request_in_flight {
            Some(Rejection::RequestInFlight)
        } else if self.upload_in_flight {
            Some(Rejection::UploadInFlight)
        } else {
            None
        }
    }
}

struct Inner {
    session_id: String,
    user_id: String,
    backend: Arc<dyn ChatBackend>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    events: EventBus,
}

/// Indices of the exchange created by a submit. Stable for the lifetime of
/// the request: nothing else appends or truncates while it is in flight.
#[derive(Debug, Clone, Copy)]
struct Exchange {
    user: usize,
    model: usize,
}

/// Clears `request_in_flight` on every exit path of a submit
struct RequestGuard {
    inner: Arc<Inner>,
    model: usize,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock();
            state.request_in_flight = false;
            if let Some(message) = state.messages.get_mut(self.model) {
                message.streaming = false;
            }
        }
        self.inner.events.publish(SessionEvent::RequestFinished);
    }
}

/// Clears `upload_in_flight` on every exit path of an upload
struct UploadGuard {
    inner: Arc<Inner>,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        self.inner.state.lock().upload_in_flight = false;
        self.inner.events.publish(SessionEvent::UploadFinished);
    }
}

/// A chat session.
///
/// Cloning is cheap and every clone observes the same transcript.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("session_id", &self.inner.session_id)
            .field("user_id", &self.inner.user_id)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, options: SessionOptions) -> Self {
        let events = EventBus::new(options.event_capacity.max(1));
        let inner = Inner {
            session_id: format!("session-{}", Uuid::new_v4()),
            user_id: format!("web-user-{}", Uuid::new_v4()),
            backend,
            options,
            state: Mutex::new(SessionState::default()),
            events,
        };
        info!(session_id = %inner.session_id, "Chat session created");
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the transcript
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.inner.state.lock().messages.len()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.inner.state.lock().messages.last().cloned()
    }

    pub fn branch_point(&self) -> Option<MessageId> {
        self.inner.state.lock().branch_point.clone()
    }

    pub fn is_branching(&self) -> bool {
        self.inner.state.lock().branch_point.is_some()
    }

    pub fn draft(&self) -> String {
        self.inner.state.lock().draft.clone()
    }

    pub fn set_draft(&self, draft: impl Into<String>) {
        self.inner.state.lock().draft = draft.into();
    }

    pub fn is_request_in_flight(&self) -> bool {
        self.inner.state.lock().request_in_flight
    }

    pub fn is_upload_in_flight(&self) -> bool {
        self.inner.state.lock().upload_in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().busy().is_some()
    }

    /// Current upload banner, if one is set and not yet expired
    pub fn upload_status(&self) -> Option<StatusBanner> {
        self.inner
            .state
            .lock()
            .upload_status
            .as_ref()
            .filter(|banner| !banner.is_expired())
            .cloned()
    }

    /// Submit the current draft
    pub async fn submit_draft(&self) -> SubmitOutcome {
        let draft = self.draft();
        self.submit(draft).await
    }

    /// Submit a prompt, continuing from the branch point if one is set.
    ///
    /// Refused without side effects when the prompt is blank or a request or
    /// upload is in flight.
    pub async fn submit(&self, prompt: impl Into<String>) -> SubmitOutcome {
        let prompt = prompt.into();
        let (request, exchange, guard) = match self.open_exchange(prompt) {
            Ok(opened) => opened,
            Err(rejection) => {
                debug!(session_id = %self.inner.session_id, ?rejection, "Submit rejected");
                return SubmitOutcome::Rejected(rejection);
            }
        };

        let span = tracing::info_span!("submit", session_id = %self.inner.session_id);
        let outcome = self.run_exchange(request, exchange).instrument(span).await;
        drop(guard);
        outcome
    }

    async fn run_exchange(&self, request: ChatRequest, exchange: Exchange) -> SubmitOutcome {
        let parent = request.parent_message_id.clone();
        info!(parent = ?parent.as_ref().map(MessageId::as_str), "Sending prompt");

        let reply = self.inner.backend.send_chat(&request).await;

        // the backend saw the request, the branch it was sent from is consumed
        let responded = match &reply {
            Ok(_) => true,
            Err(e) => e.responded(),
        };
        if responded {
            if let Some(parent) = parent.as_ref() {
                self.consume_branch_point(parent);
            }
        }

        let result = match reply {
            Ok(ChatReply::Buffered(buffered)) => {
                self.append_text(exchange, buffered.reply);
                Ok(())
            }
            Ok(ChatReply::Streamed(frames)) => self.read_frames(exchange, frames).await,
            Err(e) => Err(SessionError::Backend(e)),
        };

        match result {
            Ok(()) => {
                let (user, model) = self.exchange_ids(exchange);
                info!(user = %user, model = %model, "Reply complete");
                SubmitOutcome::Completed { user, model }
            }
            Err(e) => {
                warn!(error = %e, "Chat request failed");
                self.append_failure(&e);
                SubmitOutcome::Failed(e)
            }
        }
    }

    /// Validate, apply the branch point and push both placeholders.
    fn open_exchange(
        &self,
        prompt: String,
    ) -> Result<(ChatRequest, Exchange, RequestGuard), Rejection> {
        if prompt.trim().is_empty() {
            return Err(Rejection::EmptyPrompt);
        }

        let mut events = Vec::new();
        let (request, exchange) = {
            let mut state = self.inner.state.lock();
            if let Some(rejection) = state.busy() {
                return Err(rejection);
            }

            let parent = match state.branch_point.clone() {
                Some(id) => match state.messages.iter().position(|m| m.id == id) {
                    Some(index) => {
                        let len = index + 1;
                        if len < state.messages.len() {
                            state.messages.truncate(len);
                            events.push(SessionEvent::Truncated { len });
                        }
                        Some(id)
                    }
                    None => {
                        warn!(branch_point = %id, "Branch point no longer in transcript, sending as a plain continuation");
                        state.branch_point = None;
                        events.push(SessionEvent::BranchChanged { branch_point: None });
                        None
                    }
                },
                None => None,
            };

            let user = state.messages.len();
            state.messages.push(Message::user(prompt.clone()));
            events.push(SessionEvent::MessageAppended { index: user });

            let model = state.messages.len();
            state.messages.push(Message::model_placeholder());
            events.push(SessionEvent::MessageAppended { index: model });

            state.draft.clear();
            state.request_in_flight = true;
            events.push(SessionEvent::RequestStarted);

            let request = ChatRequest {
                prompt,
                session_id: self.inner.session_id.clone(),
                parent_message_id: parent,
            };
            (request, Exchange { user, model })
        };

        for event in events {
            self.inner.events.publish(event);
        }

        let guard = RequestGuard {
            inner: Arc::clone(&self.inner),
            model: exchange.model,
        };
        Ok((request, exchange, guard))
    }

    async fn read_frames(&self, exchange: Exchange, mut frames: FrameStream) -> SessionResult<()> {
        let mut first = true;
        while let Some(frame) = frames.next().await {
            match frame? {
                ReplyFrame::Identity { user, model } => {
                    if !first {
                        return Err(ProtocolError::LateIdentity.into());
                    }
                    self.confirm_ids(exchange, user, model)?;
                }
                ReplyFrame::Text(text) => self.append_text(exchange, text),
            }
            first = false;
        }
        Ok(())
    }

    fn confirm_ids(&self, exchange: Exchange, user: MessageId, model: MessageId) -> SessionResult<()> {
        {
            let mut state = self.inner.state.lock();

            for id in [&user, &model] {
                if id.is_placeholder() {
                    return Err(ProtocolError::PlaceholderIdentity(id.to_string()).into());
                }
                let taken = state
                    .messages
                    .iter()
                    .enumerate()
                    .any(|(i, m)| i != exchange.user && i != exchange.model && &m.id == id);
                if taken {
                    return Err(ProtocolError::DuplicateIdentity(id.to_string()).into());
                }
            }
            if user == model {
                return Err(ProtocolError::DuplicateIdentity(model.to_string()).into());
            }

            state.messages[exchange.user].id = user.clone();
            state.messages[exchange.model].id = model.clone();
        }

        debug!(user = %user, model = %model, "Message ids confirmed");
        self.inner
            .events
            .publish(SessionEvent::IdsConfirmed { user, model });
        Ok(())
    }

    fn append_text(&self, exchange: Exchange, text: String) {
        if text.is_empty() {
            return;
        }
        {
            let mut state = self.inner.state.lock();
            if let Some(message) = state.messages.get_mut(exchange.model) {
                message.parts.push_str(&text);
            }
        }
        self.inner.events.publish(SessionEvent::TextAppended {
            index: exchange.model,
            text,
        });
    }

    fn append_failure(&self, error: &SessionError) {
        let notice = Message::notice(self.inner.options.locale.chat_failure(error));
        let index = {
            let mut state = self.inner.state.lock();
            state.messages.push(notice);
            state.messages.len() - 1
        };
        self.inner
            .events
            .publish(SessionEvent::MessageAppended { index });
    }

    fn exchange_ids(&self, exchange: Exchange) -> (MessageId, MessageId) {
        let state = self.inner.state.lock();
        (
            state.messages[exchange.user].id.clone(),
            state.messages[exchange.model].id.clone(),
        )
    }

    /// Clear the branch point once the request sent from it was accepted,
    /// unless the user already picked another one meanwhile.
    fn consume_branch_point(&self, used: &MessageId) {
        let cleared = {
            let mut state = self.inner.state.lock();
            if state.branch_point.as_ref() == Some(used) {
                state.branch_point = None;
                true
            } else {
                false
            }
        };
        if cleared {
            self.inner
                .events
                .publish(SessionEvent::BranchChanged { branch_point: None });
        }
    }

    /// Mark a confirmed message as the branch point and pre-fill the draft
    /// with `text` for editing. The transcript is untouched until the next
    /// submit.
    pub fn begin_branch(&self, id: &MessageId, text: impl Into<String>) -> SessionResult<()> {
        if id.is_placeholder() {
            return Err(SessionError::not_branchable(id.as_str()));
        }

        {
            let mut state = self.inner.state.lock();
            if !state.messages.iter().any(|m| &m.id == id) {
                return Err(SessionError::not_branchable(id.as_str()));
            }
            state.branch_point = Some(id.clone());
            state.draft = text.into();
        }

        info!(branch_point = %id, "Branching");
        self.inner.events.publish(SessionEvent::BranchChanged {
            branch_point: Some(id.clone()),
        });
        Ok(())
    }

    /// Branch from the message at `index`, pre-filling the draft with its text
    pub fn begin_branch_at(&self, index: usize) -> SessionResult<MessageId> {
        let message = self
            .inner
            .state
            .lock()
            .messages
            .get(index)
            .cloned()
            .ok_or_else(|| SessionError::not_branchable(format!("#{}", index)))?;
        self.begin_branch(&message.id, message.parts)?;
        Ok(message.id)
    }

    /// Leave branching mode and clear the draft. No-op when not branching.
    pub fn cancel_branch(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.branch_point.is_none() {
                return;
            }
            state.branch_point = None;
            state.draft.clear();
        }

        debug!("Branch cancelled");
        self.inner
            .events
            .publish(SessionEvent::BranchChanged { branch_point: None });
    }

    /// Validate and upload a file to the knowledge base.
    ///
    /// Invalid files never reach the backend. The banner reflects the result
    /// and expires on its own.
    pub async fn upload(&self, file: UploadFile) -> UploadOutcome {
        let policy = &self.inner.options.upload;
        let locale = self.inner.options.locale;

        {
            let mut state = self.inner.state.lock();
            if let Some(rejection) = state.busy() {
                return UploadOutcome::Rejected(rejection);
            }

            if let Err(rejection) = policy.validate(&file) {
                let text = match &rejection {
                    UploadRejection::UnsupportedType { .. } => locale.unsupported_type(),
                    UploadRejection::TooLarge { limit, .. } => locale.too_large(*limit),
                };
                state.upload_status = Some(StatusBanner::new(
                    text,
                    BannerKind::Error,
                    Some(policy.rejection_ttl),
                ));
                drop(state);

                warn!(file = %file.file_name, %rejection, "Upload rejected locally");
                self.inner.events.publish(SessionEvent::UploadStatusChanged);
                return UploadOutcome::Invalid(rejection);
            }

            state.upload_in_flight = true;
            state.upload_status = Some(StatusBanner::new(
                locale.uploading(&file.file_name),
                BannerKind::Progress,
                None,
            ));
        }

        let guard = UploadGuard {
            inner: Arc::clone(&self.inner),
        };
        self.inner.events.publish(SessionEvent::UploadStarted);
        self.inner.events.publish(SessionEvent::UploadStatusChanged);

        info!(file = %file.file_name, size = file.size(), "Uploading");
        let result = self.inner.backend.upload(&file).await;

        let (banner, outcome) = match result {
            Ok(()) => (
                StatusBanner::new(
                    locale.uploaded(&file.file_name),
                    BannerKind::Success,
                    Some(policy.result_ttl),
                ),
                UploadOutcome::Uploaded,
            ),
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "Upload failed");
                (
                    StatusBanner::new(
                        locale.upload_failed(&e),
                        BannerKind::Error,
                        Some(policy.result_ttl),
                    ),
                    UploadOutcome::Failed(e),
                )
            }
        };

        self.inner.state.lock().upload_status = Some(banner);
        drop(guard);
        self.inner.events.publish(SessionEvent::UploadStatusChanged);
        outcome
    }
}
