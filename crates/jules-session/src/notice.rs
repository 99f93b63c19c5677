//! Human-readable notices shown in the transcript and the upload banner.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BackendError;

/// Language of user-facing notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "en")]
    English,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::French => "fr",
            Locale::English => "en",
        }
    }

    /// Synthetic model message appended when a chat request fails
    pub fn chat_failure(&self, error: &dyn fmt::Display) -> String {
        match self {
            Locale::French => format!("Désolé, une erreur est survenue : {}", error),
            Locale::English => format!("Sorry, something went wrong: {}", error),
        }
    }

    pub fn unsupported_type(&self) -> String {
        match self {
            Locale::French => {
                "❌ Erreur: Type de fichier non supporté. Uniquement .txt et .pdf.".to_string()
            }
            Locale::English => "❌ Error: unsupported file type. Only .txt and .pdf.".to_string(),
        }
    }

    pub fn too_large(&self, limit_bytes: u64) -> String {
        let limit = self.format_size(limit_bytes);
        match self {
            Locale::French => format!("❌ Erreur: Fichier trop volumineux. La limite est de {}.", limit),
            Locale::English => format!("❌ Error: file too large. The limit is {}.", limit),
        }
    }

    pub fn uploading(&self, file_name: &str) -> String {
        match self {
            Locale::French => format!("⏳ Ajout de \"{}\" à l'entrepôt...", file_name),
            Locale::English => format!("⏳ Adding \"{}\" to the knowledge base...", file_name),
        }
    }

    pub fn uploaded(&self, file_name: &str) -> String {
        match self {
            Locale::French => format!("✅ \"{}\" a été ajouté avec succès à la mémoire de Jules.", file_name),
            Locale::English => format!("✅ \"{}\" was added to Jules' memory.", file_name),
        }
    }

    /// Banner for a failed upload: the server's detail when it gave one
    pub fn upload_failed(&self, error: &BackendError) -> String {
        let reason = match error {
            BackendError::Status { message, .. } | BackendError::Transport(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            _ => self.upload_failed_fallback().to_string(),
        };
        match self {
            Locale::French => format!("❌ Erreur: {}", reason),
            Locale::English => format!("❌ Error: {}", reason),
        }
    }

    fn upload_failed_fallback(&self) -> &'static str {
        match self {
            Locale::French => "L'upload du fichier a échoué.",
            Locale::English => "The file upload failed.",
        }
    }
}

impl Locale {
    fn format_size(&self, bytes: u64) -> String {
        const MIB: u64 = 1024 * 1024;
        let whole = bytes % MIB == 0;
        match (self, whole) {
            (Locale::French, true) => format!("{} Mo", bytes / MIB),
            (Locale::French, false) => format!("{} octets", bytes),
            (Locale::English, true) => format!("{} MiB", bytes / MIB),
            (Locale::English, false) => format!("{} bytes", bytes),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fr" | "french" | "français" => Ok(Locale::French),
            "en" | "english" => Ok(Locale::English),
            _ => Err(format!("Invalid locale: {}", s)),
        }
    }
}
