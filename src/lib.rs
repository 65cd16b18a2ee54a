//! scribed - Streaming dual-channel transcription service
//!
//! Buffers microphone and system audio streams over a TCP socket
//! protocol, gates chunks on signal quality, transcribes them with a
//! pluggable engine, and pushes sentence-bounded updates back to clients.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod alerts;
pub mod asr;
pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod instance;
pub mod preserve;
pub mod server;
pub mod streaming;

// Core traits (engine, codec, matcher, sink)
pub use alerts::{AlertMatch, AlertMatcher, KeywordSpec, LexicalMatcher};
pub use asr::{AsrEngine, AsrOutput, MockAsrEngine, VadMode};
pub use audio::{AudioCodec, WavCodec};
pub use preserve::{DirPreservation, NullPreservation, PreservationSink};

// Pipeline
pub use streaming::{
    AudioStreamBuffer, ChunkProcessor, ProcessingLoop, QualityGate, StreamRegistry, StreamType,
    TranscriptAccumulator, TranscriptUpdate, TranscriptionService,
};

// Server
pub use server::{ServerContext, SocketServer};

// Error handling
pub use error::{Result, ScribedError};

// Config
pub use config::Config;
