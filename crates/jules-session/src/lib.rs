//! # Jules Session
//!
//! Client-side chat session for the Jules backend.
//!
//! ## Features
//!
//! - **Transcript ownership**: ordered messages, placeholders until the server confirms ids
//! - **Streamed replies**: incremental assembly with stateful UTF-8 decoding
//! - **Identity reconciliation**: server-assigned ids rewrite the local placeholders
//! - **Branching**: rewind to a confirmed message and resubmit from there
//! - **Upload gate**: local validation and transient status banners
//!
//! ## Example
//!
//! ```rust,no_run
//! use jules_session::{ChatBackend, ChatSession, SessionOptions, SubmitOutcome};
//! use std::sync::Arc;
//!
//! # async fn example(backend: Arc<dyn ChatBackend>) {
//! let session = ChatSession::new(backend, SessionOptions::default());
//!
//! match session.submit("Quelle est la capitale de la France ?").await {
//!     SubmitOutcome::Completed { model, .. } => println!("reply stored as {}", model),
//!     other => println!("not completed: {:?}", other),
//! }
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod event;
pub mod frame;
pub mod message;
pub mod notice;
pub mod session;
pub mod upload;

pub use backend::{BufferedReply, ChatBackend, ChatReply, ChatRequest, FrameStream};
pub use error::{BackendError, ProtocolError, SessionError, SessionResult, UploadRejection};
pub use event::{EventBus, SessionEvent};
pub use frame::{decode_frames, ReplyDecoder, ReplyFrame, Utf8Decoder, IDS_SENTINEL};
pub use message::{Message, MessageId, Role, PLACEHOLDER_PREFIX};
pub use notice::Locale;
pub use session::{ChatSession, Rejection, SessionOptions, SubmitOutcome, UploadOutcome};
pub use upload::{BannerKind, StatusBanner, UploadFile, UploadPolicy, MAX_UPLOAD_BYTES};

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
