//! Chunk preservation and diagnostic logging.
//!
//! Gated-out chunks are worth keeping: when transcription quality drops,
//! the preserved files plus the JSON-lines log show what the gate saw.
//! Preservation is best-effort: a failing sink degrades to a warning and
//! never blocks transcription.

use crate::error::{Result, ScribedError};
use crate::streaming::types::StreamType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One line of the diagnostic log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stream_id: Option<String>,
    pub stream_type: StreamType,
    /// What happened: `chunk_rejected`, `chunk_transcribed`, `stream_drained`.
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    pub duration_s: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<PathBuf>,
}

/// Sink for preserved audio and diagnostic records.
pub trait PreservationSink: Send + Sync {
    /// Writes a chunk's samples out, tagged with why it was preserved.
    ///
    /// Returns the preserved path, or `None` when the sink keeps nothing.
    fn persist_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
        stream_type: StreamType,
        tag: &str,
    ) -> Result<Option<PathBuf>>;

    /// Appends one record to the diagnostic log.
    fn append_log(&self, entry: &LogEntry) -> Result<()>;
}

/// Sink that keeps nothing. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPreservation;

impl PreservationSink for NullPreservation {
    fn persist_chunk(
        &self,
        _samples: &[f32],
        _sample_rate: u32,
        _stream_type: StreamType,
        _tag: &str,
    ) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    fn append_log(&self, _entry: &LogEntry) -> Result<()> {
        Ok(())
    }
}

/// Sink writing WAV files and a `preservation.jsonl` log to a directory.
#[derive(Debug, Clone)]
pub struct DirPreservation {
    dir: PathBuf,
}

impl DirPreservation {
    /// Creates the sink, creating the directory when missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ScribedError::Preservation {
            message: format!("Failed to create {}: {}", dir.display(), e),
        })?;
        Ok(Self { dir })
    }

    /// Directory the sink writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PreservationSink for DirPreservation {
    fn persist_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
        stream_type: StreamType,
        tag: &str,
    ) -> Result<Option<PathBuf>> {
        let name = format!(
            "{}_{}_{}.wav",
            Utc::now().format("%Y%m%d_%H%M%S%3f"),
            stream_type,
            tag
        );
        let path = self.dir.join(name);

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer =
            hound::WavWriter::create(&path, spec).map_err(|e| ScribedError::Preservation {
                message: format!("Failed to create {}: {}", path.display(), e),
            })?;
        for &s in samples {
            writer
                .write_sample(s)
                .map_err(|e| ScribedError::Preservation {
                    message: format!("Failed to write {}: {}", path.display(), e),
                })?;
        }
        writer.finalize().map_err(|e| ScribedError::Preservation {
            message: format!("Failed to finalize {}: {}", path.display(), e),
        })?;

        Ok(Some(path))
    }

    fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let line = serde_json::to_string(entry).map_err(|e| ScribedError::Preservation {
            message: format!("Failed to serialize log entry: {}", e),
        })?;

        let path = self.dir.join("preservation.jsonl");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ScribedError::Preservation {
                message: format!("Failed to open {}: {}", path.display(), e),
            })?;
        writeln!(file, "{}", line).map_err(|e| ScribedError::Preservation {
            message: format!("Failed to append to {}: {}", path.display(), e),
        })?;

        Ok(())
    }
}
