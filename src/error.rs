use thiserror::Error;

/// Library-level errors using thiserror for structured error handling.
///
/// Audio errors are never shown to the visitor: sound is cosmetic, so the
/// session logs them and carries on. Form errors are the only ones meant to
/// be surfaced as text.

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio asset: {locator}")]
    LoadFailed {
        locator: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to decode audio asset: {locator}")]
    DecodeFailed {
        locator: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to initialize audio output stream")]
    StreamInitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Audio playback failed: {locator}")]
    PlaybackFailed {
        locator: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Playback rejected by output policy: {locator}")]
    PlaybackRejected { locator: String },

    #[error("Timed out loading audio asset: {locator}")]
    Timeout { locator: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CueError {
    #[error("Cues are still loading")]
    NotReady,

    #[error("A cue is already starting")]
    Busy,

    #[error("No cues configured")]
    Empty,

    #[error("Cue {index} is unavailable")]
    Unavailable { index: usize },

    #[error("Transition cue is unavailable")]
    TransitionUnavailable,

    #[error("Cue handle no longer exists")]
    UnknownHandle,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Please enter your email")]
    MissingEmail,

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Unknown pack: {0}")]
    UnknownPack(String),

    #[error("Form endpoint rejected the submission (status {status})")]
    Rejected { status: u16 },

    #[error("Could not reach the form endpoint")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FormError {
    /// Inline text shown next to the form
    pub fn user_message(&self) -> String {
        match self {
            FormError::Rejected { .. } | FormError::Transport(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = AudioError::PlaybackRejected {
            locator: "/sounds/musicsw1.mp3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Playback rejected by output policy: /sounds/musicsw1.mp3"
        );

        assert_eq!(CueError::Unavailable { index: 2 }.to_string(), "Cue 2 is unavailable");
        assert_eq!(FormError::MissingEmail.to_string(), "Please enter your email");
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let audio_err = AudioError::LoadFailed {
            locator: "/sounds/click-01.wav".to_string(),
            source: Box::new(io_err),
        };

        assert!(audio_err.source().is_some());
        assert_eq!(
            audio_err.to_string(),
            "Failed to load audio asset: /sounds/click-01.wav"
        );
    }
}
