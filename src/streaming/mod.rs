//! The streaming transcription pipeline.
//!
//! Audio flows: buffer → gate → engine → accumulator → broadcast. The
//! registry owns per-stream state, one worker polls it, and the service
//! fronts the lifecycle operations for connections.

pub mod accumulator;
pub mod buffer;
pub mod gate;
pub mod processor;
pub mod registry;
pub mod service;
pub mod types;
pub mod worker;

pub use accumulator::{AccumulatorConfig, TranscriptAccumulator};
pub use buffer::{AudioChunk, AudioStreamBuffer, BufferConfig};
pub use gate::{GateConfig, QualityGate, RejectReason};
pub use processor::{ChunkProcessor, ChunkResult, ProcessorConfig};
pub use registry::{StreamRegistry, StreamState};
pub use service::TranscriptionService;
pub use types::{StreamType, TranscriptSegment, TranscriptUpdate};
pub use worker::{ProcessingLoop, ProcessingLoopHandle};
