#![allow(dead_code)]

use async_trait::async_trait;
use jules_session::{
    decode_frames, BackendError, BufferedReply, ChatBackend, ChatReply, ChatRequest, ReplyFrame,
    UploadFile,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// One scripted answer to `send_chat`
#[derive(Debug, Clone)]
pub enum Script {
    /// Streamed body, one entry per transport chunk
    Chunks(Vec<Vec<u8>>),
    /// Streamed body that breaks after the given chunks
    ChunksThenError(Vec<Vec<u8>>, BackendError),
    /// Already framed reply, bypassing the wire decoder
    Frames(Vec<ReplyFrame>),
    Buffered(String),
    Fail(BackendError),
}

impl Script {
    pub fn text(chunks: &[&str]) -> Self {
        Script::Chunks(chunks.iter().map(|c| c.as_bytes().to_vec()).collect())
    }

    /// Sentinel chunk followed by text chunks
    pub fn with_ids(user: &str, model: &str, chunks: &[&str]) -> Self {
        let mut all = vec![format!("__IDS__::{}::{}", user, model).into_bytes()];
        all.extend(chunks.iter().map(|c| c.as_bytes().to_vec()));
        Script::Chunks(all)
    }
}

/// Scripted in-memory backend
#[derive(Default)]
pub struct MockBackend {
    scripts: Mutex<VecDeque<Script>>,
    upload_results: Mutex<VecDeque<Result<(), BackendError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    uploads: Mutex<Vec<UploadFile>>,
    chat_gate: Mutex<Option<Arc<Notify>>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    pub fn push_upload_result(&self, result: Result<(), BackendError>) {
        self.upload_results.lock().push_back(result);
    }

    /// Hold every `send_chat` until the returned notify fires
    pub fn gate_chat(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.chat_gate.lock() = Some(Arc::clone(&notify));
        notify
    }

    pub fn gate_upload(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.upload_gate.lock() = Some(Arc::clone(&notify));
        notify
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn uploads(&self) -> Vec<UploadFile> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.requests.lock().push(request.clone());

        let gate = self.chat_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::text(&["ok"]));

        match script {
            Script::Chunks(chunks) => {
                let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, BackendError>));
                Ok(ChatReply::Streamed(decode_frames(stream)))
            }
            Script::ChunksThenError(chunks, error) => {
                let items: Vec<Result<Vec<u8>, BackendError>> = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)))
                    .collect();
                Ok(ChatReply::Streamed(decode_frames(futures::stream::iter(items))))
            }
            Script::Frames(frames) => {
                let stream = futures::stream::iter(frames.into_iter().map(Ok));
                Ok(ChatReply::Streamed(Box::pin(stream)))
            }
            Script::Buffered(reply) => Ok(ChatReply::Buffered(BufferedReply {
                reply,
                session_id: request.session_id.clone(),
            })),
            Script::Fail(error) => Err(error),
        }
    }

    async fn upload(&self, file: &UploadFile) -> Result<(), BackendError> {
        self.uploads.lock().push(file.clone());

        let gate = self.upload_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.upload_results.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// Yield until `check` holds, bounded so a broken test fails instead of hanging
pub async fn wait_until<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..1000 {
        if check() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
