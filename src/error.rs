//! Error types for scribed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribedError {
    // Protocol errors
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // Stream lifecycle errors
    #[error("Stream already exists: {stream_id}")]
    StreamAlreadyExists { stream_id: String },

    #[error("Stream not found: {stream_id}")]
    StreamNotFound { stream_id: String },

    // Transcription engine errors
    #[error("Transcription engine error: {message}")]
    Asr { message: String },

    #[error("Transcription timed out after {budget_s}s")]
    AsrTimeout { budget_s: u64 },

    #[error("Transcription model not found at {path}")]
    ModelNotFound { path: String },

    // Audio decoding errors
    #[error("Audio codec error: {message}")]
    Codec { message: String },

    // Preservation / diagnostic log errors
    #[error("Preservation error: {message}")]
    Preservation { message: String },

    // Startup errors (the only fatal ones)
    #[error("Instance lock unavailable: {message}")]
    InstanceLock { message: String },

    #[error("Failed to bind command socket: {message}")]
    SocketBind { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribedError>;
