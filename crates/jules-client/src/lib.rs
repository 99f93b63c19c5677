//! HTTP transport for the Jules backend.
//!
//! [`HttpBackend`] implements [`jules_session::ChatBackend`] on top of
//! `reqwest`: `POST /api/chat` answers either with a JSON body or with a
//! chunked text stream, `POST /api/upload` takes a multipart `file` field.

pub mod http;

pub use http::{HttpBackend, CHAT_PATH, UPLOAD_PATH};
