//! Error handling for soxframe
//!
//! Every failure surfaces synchronously at the call that needed more data.
//! Nothing is retried automatically.

use thiserror::Error;

/// Result type alias for soxframe operations
pub type Result<T> = std::result::Result<T, SoxFrameError>;

/// Main error type for soxframe operations
#[derive(Error, Debug)]
pub enum SoxFrameError {
    // Source Errors
    #[error("Source unreadable: {path}: {reason}")]
    SourceUnreadable { path: String, reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    ConfigurationInvalid { reason: String },

    // Decoding Errors
    #[error("Decode interrupted: {reason}")]
    DecodeInterrupted { reason: String },

    #[error("Decoder unavailable: could not run '{program}'")]
    DecoderUnavailable {
        program: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SoxFrameError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        SoxFrameError::ConfigurationInvalid {
            reason: reason.into(),
        }
    }

    pub(crate) fn interrupted(reason: impl Into<String>) -> Self {
        SoxFrameError::DecodeInterrupted {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SoxFrameError::SourceUnreadable { .. } => "SOURCE_UNREADABLE",
            SoxFrameError::ConfigurationInvalid { .. } => "CONFIGURATION_INVALID",
            SoxFrameError::DecodeInterrupted { .. } => "DECODE_INTERRUPTED",
            SoxFrameError::DecoderUnavailable { .. } => "DECODER_UNAVAILABLE",
            SoxFrameError::Io(_) => "IO_ERROR",
            SoxFrameError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if reopening the source could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SoxFrameError::DecodeInterrupted { .. } | SoxFrameError::Io(_)
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SoxFrameError::SourceUnreadable { .. } => vec![
                "Check the file path is correct",
                "Check that the decoder supports this file type",
                "Try converting the file to WAV first",
            ],
            SoxFrameError::ConfigurationInvalid { .. } => vec![
                "Frame size, hop size, channels and sample rate must be positive",
                "Overlap must lie in [0, 1)",
            ],
            SoxFrameError::DecodeInterrupted { .. } => vec![
                "Reopen the source to start a fresh decoding session",
                "Increase the read timeout if the decoder is slow to start",
            ],
            SoxFrameError::DecoderUnavailable { .. } => vec![
                "Install SoX from http://sox.sourceforge.net/",
                "Set SOXFRAME_SOX_PATH or SOXFRAME_FFMPEG_PATH to the decoder binary",
            ],
            _ => vec![],
        }
    }
}
