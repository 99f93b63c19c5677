use async_trait::async_trait;
use futures::TryStreamExt;
use jules_config::{ApiBase, ApiConfig};
use jules_session::{
    decode_frames, BackendError, BufferedReply, ChatBackend, ChatReply, ChatRequest, UploadFile,
};
use reqwest::{header, multipart, Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const CHAT_PATH: &str = "/api/chat";
pub const UPLOAD_PATH: &str = "/api/upload";

/// HTTP transport for the chat and upload endpoints.
///
/// One attempt per call. A timeout is only applied when configured.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: ApiBase,
}

impl HttpBackend {
    /// Create a backend for an absolute origin such as `http://127.0.0.1:8000`
    pub fn new(origin: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let origin = origin.into().trim_end_matches('/').to_string();
        if origin.is_empty() {
            return Err(BackendError::Config("empty API origin".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base: ApiBase::Origin(origin),
        })
    }

    /// A same-origin base has no host to talk to from a native client
    pub fn from_api_base(base: &ApiBase, timeout: Option<Duration>) -> Result<Self, BackendError> {
        match base.origin() {
            Some(origin) => Self::new(origin, timeout),
            None => Err(BackendError::Config(
                "production API origin not configured".to_string(),
            )),
        }
    }

    /// Resolve the base URL from config and build the backend
    pub fn from_config(config: &ApiConfig, cli_override: Option<&str>) -> Result<Self, BackendError> {
        Self::from_api_base(&config.resolve_base(cli_override), config.request_timeout())
    }

    pub fn origin(&self) -> &str {
        self.base.origin().unwrap_or_default()
    }

    fn endpoint(&self, path: &str) -> String {
        self.base.join(path)
    }

    /// Check that the backend answers at all
    pub async fn health_check(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.endpoint("/"))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let response = self
            .client
            .post(self.endpoint(CHAT_PATH))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        if is_json(&response) {
            debug!(status = status.as_u16(), "Buffered chat reply");
            let reply: BufferedReply = response
                .json()
                .await
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            return Ok(ChatReply::Buffered(reply));
        }

        debug!(status = status.as_u16(), "Streaming chat reply");
        let chunks = response.bytes_stream().map_err(transport_error);
        Ok(ChatReply::Streamed(decode_frames(chunks)))
    }

    async fn upload(&self, file: &UploadFile) -> Result<(), BackendError> {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| BackendError::Config(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Transport(format!("request timed out: {}", e))
    } else {
        BackendError::Transport(e.to_string())
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().starts_with("application/json"))
        .unwrap_or(false)
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// `{detail}` from the body when present, else the status reason phrase
pub(crate) async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    BackendError::status(status.as_u16(), error_message(status, &body))
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .map(|detail| match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

    detail.unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.as_u16().to_string())
    })
}
