//! Upload validation and the transient status banner.

use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::UploadRejection;

/// 5 MiB
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// MIME types accepted by the knowledge base
pub const ALLOWED_MIME_TYPES: &[&str] = &["text/plain", "application/pdf"];

/// How long a validation error stays visible
pub const REJECTION_TTL: Duration = Duration::from_secs(4);

/// How long an upload success or failure stays visible
pub const RESULT_TTL: Duration = Duration::from_secs(5);

/// A file ready to be sent to `POST /api/upload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, inferring its MIME type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            file_name,
            mime_type: mime_for_path(path).to_string(),
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// MIME type for a path, by extension
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Client-side upload limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
    pub rejection_ttl: Duration,
    pub result_ttl: Duration,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            allowed_types: ALLOWED_MIME_TYPES.iter().map(|t| t.to_string()).collect(),
            rejection_ttl: REJECTION_TTL,
            result_ttl: RESULT_TTL,
        }
    }
}

impl UploadPolicy {
    /// Type is checked before size.
    pub fn validate(&self, file: &UploadFile) -> Result<(), UploadRejection> {
        if !self.allowed_types.iter().any(|t| t == &file.mime_type) {
            return Err(UploadRejection::UnsupportedType {
                mime: file.mime_type.clone(),
            });
        }

        if file.size() > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                size: file.size(),
                limit: self.max_bytes,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Progress,
    Success,
    Error,
}

/// Upload status line. Expires after its ttl; a banner without ttl stays
/// until replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBanner {
    pub text: String,
    pub kind: BannerKind,
    shown_at: Instant,
    ttl: Option<Duration>,
}

impl StatusBanner {
    pub fn new(text: impl Into<String>, kind: BannerKind, ttl: Option<Duration>) -> Self {
        Self {
            text: text.into(),
            kind,
            shown_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.shown_at) >= ttl,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_of(size: usize, mime: &str) -> UploadFile {
        UploadFile::new("notes.txt", mime, vec![b'a'; size])
    }

    #[test]
    fn test_size_boundary() {
        let policy = UploadPolicy::default();
        assert!(policy.validate(&file_of(5 * 1024 * 1024, "text/plain")).is_ok());
        assert_eq!(
            policy.validate(&file_of(5 * 1024 * 1024 + 1, "text/plain")),
            Err(UploadRejection::TooLarge {
                size: 5 * 1024 * 1024 + 1,
                limit: MAX_UPLOAD_BYTES,
            })
        );
    }

    #[test]
    fn test_type_checked_first() {
        let policy = UploadPolicy::default();
        assert!(matches!(
            policy.validate(&file_of(6 * 1024 * 1024, "image/png")),
            Err(UploadRejection::UnsupportedType { .. })
        ));
        assert!(policy.validate(&file_of(10, "application/pdf")).is_ok());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/b/notes.TXT")), "text/plain");
        assert_eq!(mime_for_path(Path::new("paper.pdf")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("image.png")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("README")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memo.txt");
        tokio::fs::write(&path, b"bonjour").await.unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "memo.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_expiry() {
        let banner = StatusBanner::new("oops", BannerKind::Error, Some(REJECTION_TTL));
        assert!(!banner.is_expired());
        tokio::time::advance(Duration::from_millis(3999)).await;
        assert!(!banner.is_expired());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(banner.is_expired());

        let sticky = StatusBanner::new("uploading", BannerKind::Progress, None);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!sticky.is_expired());
    }
}
