//! Chunk processing: gate, engine invocation, accumulation, broadcast.
//!
//! One processor is shared by the polling worker, the stop-drain path,
//! and the one-shot file command, so every route through the system
//! applies the same gate and produces the same update stream.

use crate::asr::{AsrEngine, AsrOutput, VadMode};
use crate::audio::analysis::analyze_samples;
use crate::audio::codec::AudioCodec;
use crate::defaults;
use crate::error::{Result, ScribedError};
use crate::preserve::{LogEntry, PreservationSink};
use crate::streaming::buffer::AudioChunk;
use crate::streaming::gate::{QualityGate, RejectReason};
use crate::streaming::registry::StreamState;
use crate::streaming::types::{StreamType, TranscriptUpdate};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of the update broadcast channel.
///
/// A slow connection lags and loses old updates rather than stalling the
/// processing loop.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Configuration for the processor.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Sample rate of buffered audio in Hz.
    pub sample_rate: u32,
    /// Wall-clock budget for one engine invocation.
    pub asr_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            asr_timeout: Duration::from_secs(defaults::ASR_TIMEOUT_S),
        }
    }
}

/// Outcome of one chunk's trip through the pipeline.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    /// All segment text, joined; empty for gated or silent chunks.
    pub text: String,
    pub language: Option<String>,
    pub language_probability: Option<f32>,
    /// Duration of the audio involved, in seconds.
    pub duration_s: f64,
    /// Set when the gate short-circuited the engine.
    pub rejected: Option<RejectReason>,
}

impl ChunkResult {
    fn rejected(reason: RejectReason, duration_s: f64) -> Self {
        Self {
            text: String::new(),
            language: None,
            language_probability: None,
            duration_s,
            rejected: Some(reason),
        }
    }

    fn from_output(output: &AsrOutput) -> Self {
        Self {
            text: output.joined_text(),
            language: output.language.clone(),
            language_probability: output.language_probability,
            duration_s: output.duration_s,
            rejected: None,
        }
    }
}

/// Shared gate → engine → accumulator → broadcast stage.
pub struct ChunkProcessor {
    engine: Arc<dyn AsrEngine>,
    gate: QualityGate,
    preservation: Arc<dyn PreservationSink>,
    updates: broadcast::Sender<TranscriptUpdate>,
    config: ProcessorConfig,
}

impl ChunkProcessor {
    /// Creates a processor around an engine and a preservation sink.
    pub fn new(
        engine: Arc<dyn AsrEngine>,
        gate: QualityGate,
        preservation: Arc<dyn PreservationSink>,
        config: ProcessorConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            engine,
            gate,
            preservation,
            updates,
            config,
        }
    }

    /// Subscribes to sentence updates across all streams.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptUpdate> {
        self.updates.subscribe()
    }

    /// Sample rate this processor assumes for buffered audio.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Runs one extracted chunk through gate, engine, and accumulator.
    ///
    /// Emitted sentences go to the broadcast channel; the result reports
    /// what happened to the chunk itself.
    pub async fn process_chunk(&self, stream: &StreamState, chunk: AudioChunk) -> Result<ChunkResult> {
        let stats = analyze_samples(&chunk.samples, self.config.sample_rate);

        if let Some(reason) = self.gate.evaluate(&stats, stream.stream_type) {
            debug!(
                stream_id = %stream.id,
                chunk_id = chunk.chunk_id,
                reason = %reason,
                duration_s = stats.duration_s,
                "chunk rejected by quality gate"
            );
            self.preserve_rejected(stream, &chunk, reason, stats.duration_s);
            return Ok(ChunkResult::rejected(reason, stats.duration_s));
        }

        let output = self
            .invoke_engine(chunk.samples.clone(), stream.stream_type)
            .await?;

        let mut emitted = Vec::new();
        {
            let mut accumulator = stream
                .accumulator
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for segment in &output.segments {
                // Engine times are chunk-relative; report stream-relative.
                let segment = segment.offset_by(chunk.start_offset);
                if let Some(update) = accumulator.add_segment(&segment) {
                    emitted.push(update);
                }
            }
            if chunk.forced
                && let Some(update) = accumulator.flush()
            {
                emitted.push(update);
            }
        }
        self.broadcast(emitted);

        Ok(ChunkResult::from_output(&output))
    }

    /// Emits a stream's pending sentence if its timeout has passed.
    pub fn check_timeout(&self, stream: &StreamState) {
        let update = {
            let mut accumulator = stream
                .accumulator
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            accumulator.check_timeout()
        };
        if let Some(update) = update {
            self.broadcast(vec![update]);
        }
    }

    /// One-shot file transcription: analyze, gate, decode, transcribe.
    ///
    /// Bypasses buffers and accumulators; the caller gets the transcript
    /// directly.
    pub async fn transcribe_file(
        &self,
        codec: &dyn AudioCodec,
        path: &Path,
        stream_type: StreamType,
    ) -> Result<ChunkResult> {
        let analysis = codec.analyze(path)?;

        if let Some(reason) = self.gate.evaluate(&analysis.stats, stream_type) {
            debug!(path = %path.display(), reason = %reason, "file rejected by quality gate");
            self.log_event(LogEntry {
                timestamp: Utc::now(),
                stream_id: None,
                stream_type,
                event: "chunk_rejected".to_string(),
                reason: Some(reason.as_str().to_string()),
                duration_s: analysis.stats.duration_s,
                path: Some(path.to_path_buf()),
            });
            return Ok(ChunkResult::rejected(reason, analysis.stats.duration_s));
        }

        let samples = codec.resample_to_pcm(path, self.config.sample_rate)?;
        let output = self.invoke_engine(samples, stream_type).await?;
        Ok(ChunkResult::from_output(&output))
    }

    /// Runs the engine on a blocking thread under the wall-clock budget.
    ///
    /// A stalled invocation times out for this stream only; the caller's
    /// loop moves on to other streams.
    async fn invoke_engine(&self, samples: Vec<f32>, stream_type: StreamType) -> Result<AsrOutput> {
        let engine = Arc::clone(&self.engine);
        let sample_rate = self.config.sample_rate;
        let vad = VadMode::for_stream(stream_type);

        let task =
            tokio::task::spawn_blocking(move || engine.transcribe(&samples, sample_rate, vad));

        match tokio::time::timeout(self.config.asr_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ScribedError::Asr {
                message: format!("Transcription task failed: {}", join_error),
            }),
            Err(_) => Err(ScribedError::AsrTimeout {
                budget_s: self.config.asr_timeout.as_secs(),
            }),
        }
    }

    fn preserve_rejected(
        &self,
        stream: &StreamState,
        chunk: &AudioChunk,
        reason: RejectReason,
        duration_s: f64,
    ) {
        let path = match self.preservation.persist_chunk(
            &chunk.samples,
            self.config.sample_rate,
            stream.stream_type,
            reason.as_str(),
        ) {
            Ok(path) => path,
            Err(e) => {
                warn!(stream_id = %stream.id, "failed to preserve rejected chunk: {}", e);
                None
            }
        };

        self.log_event(LogEntry {
            timestamp: Utc::now(),
            stream_id: Some(stream.id.clone()),
            stream_type: stream.stream_type,
            event: "chunk_rejected".to_string(),
            reason: Some(reason.as_str().to_string()),
            duration_s,
            path,
        });
    }

    fn log_event(&self, entry: LogEntry) {
        if let Err(e) = self.preservation.append_log(&entry) {
            warn!("failed to append preservation log: {}", e);
        }
    }

    /// Pushes one update to subscribers.
    pub(crate) fn broadcast_one(&self, update: TranscriptUpdate) {
        // Send fails only when nobody is subscribed; that is fine.
        let _ = self.updates.send(update);
    }

    fn broadcast(&self, updates: Vec<TranscriptUpdate>) {
        for update in updates {
            self.broadcast_one(update);
        }
    }
}
