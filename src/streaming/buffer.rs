//! Per-stream audio buffer with overlap-preserving chunk extraction.
//!
//! Samples append at the tail and leave from the head in bounded chunks.
//! The tail of every extracted chunk is reinserted at the head so a word
//! straddling a chunk boundary is never split between two independent
//! engine passes.

use crate::audio::analysis::decode_f32_pcm;
use crate::defaults;
use crate::error::Result;
use std::collections::VecDeque;
use std::time::Instant;

/// Configuration for a stream buffer.
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    /// Sample rate of the incoming PCM in Hz.
    pub sample_rate: u32,
    /// Target chunk duration in seconds.
    pub chunk_duration_s: f64,
    /// Minimum buffered duration (seconds) for a time-based flush.
    pub min_chunk_duration_s: f64,
    /// Overlap carried between consecutive chunks, in seconds.
    pub overlap_duration_s: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_duration_s: defaults::CHUNK_DURATION_S,
            min_chunk_duration_s: defaults::MIN_CHUNK_DURATION_S,
            overlap_duration_s: defaults::OVERLAP_DURATION_S,
        }
    }
}

/// A bounded slice of buffered audio ready for one engine pass.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Per-stream sequence number.
    pub chunk_id: u64,
    /// Mono f32 samples.
    pub samples: Vec<f32>,
    /// Position of the first sample within the whole stream, in seconds.
    pub start_offset: f64,
    /// Whether this chunk came from a forced drain rather than normal
    /// readiness.
    pub forced: bool,
}

impl AudioChunk {
    /// Chunk length in seconds.
    pub fn duration_s(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }
}

/// Sample queue for one logical stream.
///
/// Appends and extractions are short critical sections; callers wrap the
/// buffer in a `Mutex` so a connection can append while the processing
/// loop extracts, without either blocking on engine work.
pub struct AudioStreamBuffer {
    config: BufferConfig,
    samples: VecDeque<f32>,
    chunk_samples: usize,
    min_samples: usize,
    overlap_samples: usize,
    /// Stream position (in samples) of the first buffered sample.
    head_offset: u64,
    last_extraction: Instant,
    next_chunk_id: u64,
}

impl AudioStreamBuffer {
    /// Creates a buffer with default thresholds.
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Creates a buffer with custom thresholds.
    pub fn with_config(config: BufferConfig) -> Self {
        let rate = config.sample_rate as f64;
        Self {
            chunk_samples: (config.chunk_duration_s * rate) as usize,
            min_samples: (config.min_chunk_duration_s * rate) as usize,
            overlap_samples: (config.overlap_duration_s * rate) as usize,
            samples: VecDeque::new(),
            head_offset: 0,
            last_extraction: Instant::now(),
            next_chunk_id: 0,
            config,
        }
    }

    /// Appends raw little-endian f32 mono PCM bytes.
    ///
    /// Returns the number of samples appended.
    pub fn add_audio_data(&mut self, data: &[u8]) -> Result<usize> {
        let decoded = decode_f32_pcm(data)?;
        let count = decoded.len();
        self.samples.extend(decoded);
        Ok(count)
    }

    /// Appends already-decoded samples.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.samples.extend(samples.iter().copied());
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Buffered audio length in seconds.
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.config.sample_rate as f64
    }

    /// Extracts a chunk if one is ready.
    ///
    /// Ready means a full chunk has accumulated, or at least the minimum
    /// has and a chunk period has elapsed since the previous extraction.
    /// On extraction the trailing `min(overlap, extracted)` samples go
    /// back to the head. Never returns an empty chunk.
    pub fn get_chunk_if_ready(&mut self) -> Option<AudioChunk> {
        let full = self.samples.len() >= self.chunk_samples;
        let timed = self.samples.len() >= self.min_samples
            && self.last_extraction.elapsed().as_secs_f64() >= self.config.chunk_duration_s;

        if !full && !timed {
            return None;
        }

        let take = self.samples.len().min(self.chunk_samples);
        Some(self.extract(take, false))
    }

    /// Drains everything left in the buffer as one forced chunk.
    ///
    /// Used when a stream stops: trailing audio gets a final engine pass
    /// instead of being discarded. No overlap is retained. Returns `None`
    /// when the buffer is empty.
    pub fn take_remaining(&mut self) -> Option<AudioChunk> {
        if self.samples.is_empty() {
            return None;
        }
        let take = self.samples.len();
        Some(self.extract(take, true))
    }

    fn extract(&mut self, take: usize, forced: bool) -> AudioChunk {
        let extracted: Vec<f32> = self.samples.drain(..take).collect();

        // A forced drain keeps nothing back; the stream is ending.
        let overlap = if forced {
            0
        } else {
            self.overlap_samples.min(extracted.len())
        };
        for &s in extracted[extracted.len() - overlap..].iter().rev() {
            self.samples.push_front(s);
        }

        let start_offset = self.head_offset as f64 / self.config.sample_rate as f64;
        self.head_offset += (take - overlap) as u64;
        self.last_extraction = Instant::now();

        let chunk_id = self.next_chunk_id;
        self.next_chunk_id += 1;

        AudioChunk {
            chunk_id,
            samples: extracted,
            start_offset,
            forced,
        }
    }

    /// Drops all buffered samples and resets counters.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.head_offset = 0;
        self.next_chunk_id = 0;
        self.last_extraction = Instant::now();
    }

    /// Maximum samples per extracted chunk.
    pub fn chunk_samples(&self) -> usize {
        self.chunk_samples
    }

    /// Samples carried between consecutive chunks.
    pub fn overlap_samples(&self) -> usize {
        self.overlap_samples
    }
}

impl Default for AudioStreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}
