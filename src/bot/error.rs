//! Error type for the Telegram front-end.

use crate::error::Pdf2PngError;
use teloxide::dispatching::dialogue::InMemStorageError;
use thiserror::Error;

/// Reply for failures that are not the user's to fix.
pub const CRITICAL_ERROR_TEXT: &str =
    "A critical error occurred during processing. The operation has been stopped.";

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

/// Everything that can go wrong while serving a chat.
///
/// Conversion failures keep their [`Pdf2PngError`] so handlers can pick the
/// matching chat reply via [`Pdf2PngError::user_message`].
#[derive(Debug, Error)]
pub enum BotError {
    /// Missing required setting
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telegram Bot API call failed
    #[error("Telegram API error: {0}")]
    Request(#[from] teloxide::RequestError),

    /// File download from Telegram failed
    #[error("Telegram download failed: {0}")]
    Download(#[from] teloxide::DownloadError),

    /// Dialogue storage failed
    #[error("Dialogue storage error: {0}")]
    Storage(#[from] InMemStorageError),

    /// The upload is larger than the configured limit.
    #[error("File is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// PDF conversion failed
    #[error(transparent)]
    Conversion(#[from] Pdf2PngError),

    /// Local I/O (temp files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Text to send to the chat for this error.
    pub fn user_message(&self) -> String {
        match self {
            BotError::Conversion(e) => e.user_message().to_string(),
            BotError::FileTooLarge { limit, .. } => format!(
                "⚠️ This file is too large. The maximum size is {} MB.",
                limit / (1024 * 1024)
            ),
            _ => CRITICAL_ERROR_TEXT.to_string(),
        }
    }
}
