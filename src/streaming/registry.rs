//! Registry of active audio streams.
//!
//! Maps stream identifier to its buffer/accumulator pair. Map structure
//! has its own lock; each stream's buffer and accumulator carry their own,
//! so starting one stream never waits on another stream's extraction.

use crate::error::{Result, ScribedError};
use crate::streaming::accumulator::{AccumulatorConfig, TranscriptAccumulator};
use crate::streaming::buffer::{AudioStreamBuffer, BufferConfig};
use crate::streaming::types::StreamType;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Everything owned by one logical stream.
pub struct StreamState {
    pub id: String,
    pub stream_type: StreamType,
    /// Sample queue; locked per append/extract, never across engine work.
    pub buffer: Mutex<AudioStreamBuffer>,
    /// Sentence state machine; the processing loop is its main writer,
    /// the stop-drain path its last.
    pub accumulator: Mutex<TranscriptAccumulator>,
}

/// Owner of all active streams.
pub struct StreamRegistry {
    streams: RwLock<HashMap<String, Arc<StreamState>>>,
    buffer_config: BufferConfig,
    accumulator_config: AccumulatorConfig,
}

impl StreamRegistry {
    /// Creates an empty registry with default per-stream configuration.
    pub fn new() -> Self {
        Self::with_configs(BufferConfig::default(), AccumulatorConfig::default())
    }

    /// Creates an empty registry with custom per-stream configuration.
    pub fn with_configs(
        buffer_config: BufferConfig,
        accumulator_config: AccumulatorConfig,
    ) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            buffer_config,
            accumulator_config,
        }
    }

    /// Registers a new stream.
    ///
    /// # Errors
    /// `StreamAlreadyExists` when the identifier is taken.
    pub fn start_stream(&self, id: &str, stream_type: StreamType) -> Result<Arc<StreamState>> {
        let mut streams = self.streams.write().unwrap_or_else(std::sync::PoisonError::into_inner);

        if streams.contains_key(id) {
            return Err(ScribedError::StreamAlreadyExists {
                stream_id: id.to_string(),
            });
        }

        let state = Arc::new(StreamState {
            id: id.to_string(),
            stream_type,
            buffer: Mutex::new(AudioStreamBuffer::with_config(self.buffer_config)),
            accumulator: Mutex::new(TranscriptAccumulator::with_config(
                id,
                stream_type,
                self.accumulator_config,
            )),
        });

        streams.insert(id.to_string(), Arc::clone(&state));
        Ok(state)
    }

    /// Removes a stream and returns it so the caller can run the final
    /// drain before letting it drop.
    ///
    /// # Errors
    /// `StreamNotFound` when the identifier is unknown.
    pub fn remove_stream(&self, id: &str) -> Result<Arc<StreamState>> {
        let mut streams = self.streams.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        streams
            .remove(id)
            .ok_or_else(|| ScribedError::StreamNotFound {
                stream_id: id.to_string(),
            })
    }

    /// Appends raw PCM bytes to a stream's buffer.
    ///
    /// # Errors
    /// `StreamNotFound` for unknown identifiers; codec errors for
    /// malformed payloads.
    pub fn add_audio_chunk(&self, id: &str, data: &[u8]) -> Result<usize> {
        let stream = self.get(id).ok_or_else(|| ScribedError::StreamNotFound {
            stream_id: id.to_string(),
        })?;
        let mut buffer = stream.buffer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffer.add_audio_data(data)
    }

    /// Looks up one stream.
    pub fn get(&self, id: &str) -> Option<Arc<StreamState>> {
        self.streams
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Snapshot of all active streams for one polling cycle.
    pub fn active(&self) -> Vec<Arc<StreamState>> {
        self.streams
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of active streams.
    pub fn len(&self) -> usize {
        self.streams.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// True when no streams are active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
