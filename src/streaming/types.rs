//! Shared types flowing through the streaming pipeline.

use serde::{Deserialize, Serialize};

/// Classification of an audio source.
///
/// Fixed at stream creation; selects the quality-gate floors and the
/// engine's voice-activity-detection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// Local microphone capture.
    Microphone,
    /// System output (loopback) capture.
    System,
}

impl StreamType {
    /// Lowercase name used in file names and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Microphone => "microphone",
            StreamType::System => "system",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed piece of engine output.
///
/// Times are seconds relative to the chunk the segment came from until the
/// processor offsets them to stream-relative values.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Segment length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Returns a copy with both timestamps shifted by `offset` seconds.
    pub fn offset_by(&self, offset: f64) -> Self {
        Self {
            text: self.text.clone(),
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

/// A completed sentence emitted by an accumulator.
///
/// Handed to the broadcast channel immediately; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptUpdate {
    pub stream_id: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub stream_type: StreamType,
}
