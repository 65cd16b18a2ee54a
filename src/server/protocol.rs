//! JSON line protocol for the command socket.
//!
//! Every request is one JSON object on one line, tagged by `type`, and
//! gets exactly one reply line. Connections holding live streams also
//! receive unsolicited `transcript_update` records.

use crate::alerts::{AlertMatch, KeywordSpec};
use crate::streaming::types::{StreamType, TranscriptUpdate};
use serde::{Deserialize, Serialize};

/// Commands a client can send. A closed set: anything else is a protocol
/// error answered in-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Register a new audio stream.
    StartStream {
        stream_id: String,
        stream_type: StreamType,
    },
    /// Stop a stream, draining buffered audio first.
    StopStream { stream_id: String },
    /// Append base64 PCM to a stream's buffer.
    StreamChunk {
        stream_id: String,
        audio_data: String,
    },
    /// One-shot: transcribe a complete audio file, bypassing buffers.
    DualStreamChunk {
        audio_path: String,
        stream_type: StreamType,
    },
    /// Match keywords against a transcript.
    CheckAlerts {
        transcript: String,
        keywords: Vec<KeywordSpec>,
    },
}

impl Request {
    /// Serialize to a JSON line (without the newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a JSON line.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Replies and pushed records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Generic command outcome.
    Ack {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        stream_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    /// One-shot transcription result.
    Transcript {
        success: bool,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        language: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        language_probability: Option<f32>,
        duration: f64,
    },
    /// Keyword match results.
    Alerts {
        success: bool,
        matches: Vec<AlertMatch>,
    },
    /// Unsolicited sentence update for a live stream.
    TranscriptUpdate {
        stream_id: String,
        text: String,
        start_time: f64,
        end_time: f64,
        stream_type: StreamType,
    },
}

impl Response {
    /// Plain success.
    pub fn ok() -> Self {
        Response::Ack {
            success: true,
            stream_id: None,
            error: None,
        }
    }

    /// Success acknowledging a specific stream.
    pub fn ok_stream(stream_id: impl Into<String>) -> Self {
        Response::Ack {
            success: true,
            stream_id: Some(stream_id.into()),
            error: None,
        }
    }

    /// In-band failure; the connection stays open.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Ack {
            success: false,
            stream_id: None,
            error: Some(message.into()),
        }
    }

    /// Wraps a sentence update for the wire.
    pub fn update(update: TranscriptUpdate) -> Self {
        Response::TranscriptUpdate {
            stream_id: update.stream_id,
            text: update.text,
            start_time: update.start,
            end_time: update.end,
            stream_type: update.stream_type,
        }
    }

    /// Serialize to a JSON line (without the newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a JSON line.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
