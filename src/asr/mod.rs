//! Speech-to-text engine interface.
//!
//! The pipeline treats the engine as a black box behind [`AsrEngine`]:
//! mono f32 samples in, timed segments out. Implementations: the
//! whisper-rs engine (feature `whisper`) and a scriptable mock for tests.

pub mod whisper;
pub use whisper::{WhisperConfig, WhisperEngine};

use crate::error::{Result, ScribedError};
use crate::streaming::types::{StreamType, TranscriptSegment};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Voice-activity-detection mode for an engine invocation.
///
/// Loopback audio is clean enough that VAD does more harm than good
/// (music and produced speech get clipped), so system streams run
/// without it. Microphone streams use a lenient profile that tolerates
/// natural pauses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VadMode {
    /// No voice-activity filtering.
    Disabled,
    /// Permissive filtering for microphone input.
    Lenient(VadParams),
}

/// Parameters for the lenient VAD profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadParams {
    /// Silence required before a speech region is cut, in milliseconds.
    pub min_silence_duration_ms: u32,
    /// Padding kept around detected speech, in milliseconds.
    pub speech_pad_ms: u32,
    /// Longest single speech region, in seconds.
    pub max_speech_duration_s: u32,
}

impl Default for VadParams {
    fn default() -> Self {
        Self {
            min_silence_duration_ms: 1000,
            speech_pad_ms: 400,
            max_speech_duration_s: 30,
        }
    }
}

impl VadMode {
    /// VAD mode for a stream type.
    pub fn for_stream(stream_type: StreamType) -> Self {
        match stream_type {
            StreamType::Microphone => VadMode::Lenient(VadParams::default()),
            StreamType::System => VadMode::Disabled,
        }
    }
}

/// One complete engine invocation's output.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrOutput {
    /// Timed segments, chunk-relative.
    pub segments: Vec<TranscriptSegment>,
    /// Detected language code, when the engine reports one.
    pub language: Option<String>,
    /// Confidence of the language detection.
    pub language_probability: Option<f32>,
    /// Duration of the audio the engine saw, in seconds.
    pub duration_s: f64,
}

impl AsrOutput {
    /// All segment text joined with single spaces.
    pub fn joined_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Trait for speech-to-text engines.
///
/// Implementations are synchronous; the pipeline moves invocations onto a
/// blocking thread and applies its own wall-clock budget.
pub trait AsrEngine: Send + Sync {
    /// Transcribes mono f32 samples at the given rate.
    ///
    /// # Arguments
    /// * `samples` - Audio as f32 normalized to [-1.0, 1.0]
    /// * `sample_rate` - Sample rate in Hz
    /// * `vad` - Voice-activity-detection mode for this invocation
    fn transcribe(&self, samples: &[f32], sample_rate: u32, vad: VadMode) -> Result<AsrOutput>;

    /// Name of the loaded model.
    fn model_name(&self) -> &str;

    /// Whether the engine can serve requests.
    fn is_ready(&self) -> bool;
}

/// Implement AsrEngine for Arc<T> so one engine is shared across streams.
impl<T: AsrEngine + ?Sized> AsrEngine for Arc<T> {
    fn transcribe(&self, samples: &[f32], sample_rate: u32, vad: VadMode) -> Result<AsrOutput> {
        (**self).transcribe(samples, sample_rate, vad)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Scriptable engine for tests.
///
/// Returns the scripted segment batches in order, repeating the last one
/// once the script runs out, and counts invocations so tests can assert
/// the gate short-circuited.
pub struct MockAsrEngine {
    script: Mutex<Vec<Vec<TranscriptSegment>>>,
    position: AtomicUsize,
    calls: AtomicUsize,
    should_fail: bool,
}

impl MockAsrEngine {
    /// Engine that returns no segments.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(vec![Vec::new()]),
            position: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    /// Engine that returns the same segments on every call.
    pub fn with_segments(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            script: Mutex::new(vec![segments]),
            ..Self::new()
        }
    }

    /// Engine that returns one batch per call, in order.
    pub fn with_script(script: Vec<Vec<TranscriptSegment>>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Self::new()
        }
    }

    /// Engine whose every call fails.
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    /// Number of transcribe calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAsrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AsrEngine for MockAsrEngine {
    fn transcribe(&self, samples: &[f32], sample_rate: u32, _vad: VadMode) -> Result<AsrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(ScribedError::Asr {
                message: "mock transcription failure".to_string(),
            });
        }

        let script = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let index = self.position.fetch_add(1, Ordering::SeqCst);
        let segments = script
            .get(index.min(script.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default();

        Ok(AsrOutput {
            segments,
            language: Some("en".to_string()),
            language_probability: Some(0.99),
            duration_s: samples.len() as f64 / sample_rate as f64,
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vad_mode_per_stream_type() {
        assert_eq!(VadMode::for_stream(StreamType::System), VadMode::Disabled);
        assert!(matches!(
            VadMode::for_stream(StreamType::Microphone),
            VadMode::Lenient(_)
        ));
    }

    #[test]
    fn test_vad_lenient_defaults() {
        let params = VadParams::default();
        assert_eq!(params.min_silence_duration_ms, 1000);
        assert_eq!(params.speech_pad_ms, 400);
        assert_eq!(params.max_speech_duration_s, 30);
    }

    #[test]
    fn test_mock_returns_scripted_segments() {
        let engine = MockAsrEngine::with_segments(vec![TranscriptSegment::new("hi.", 0.0, 1.5)]);

        let output = engine
            .transcribe(&vec![0.0; 16000], 16000, VadMode::Disabled)
            .unwrap();
        assert_eq!(output.segments.len(), 1);
        assert_eq!(output.segments[0].text, "hi.");
        assert!((output.duration_s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mock_script_advances_then_repeats() {
        let engine = MockAsrEngine::with_script(vec![
            vec![TranscriptSegment::new("first", 0.0, 1.5)],
            vec![TranscriptSegment::new("second", 0.0, 1.5)],
        ]);
        let audio = vec![0.0f32; 100];

        let a = engine.transcribe(&audio, 16000, VadMode::Disabled).unwrap();
        let b = engine.transcribe(&audio, 16000, VadMode::Disabled).unwrap();
        let c = engine.transcribe(&audio, 16000, VadMode::Disabled).unwrap();

        assert_eq!(a.segments[0].text, "first");
        assert_eq!(b.segments[0].text, "second");
        assert_eq!(c.segments[0].text, "second");
        assert_eq!(engine.call_count(), 3);
    }

    #[test]
    fn test_mock_failure() {
        let engine = MockAsrEngine::with_failure();
        let result = engine.transcribe(&[0.0], 16000, VadMode::Disabled);
        assert!(matches!(result, Err(ScribedError::Asr { .. })));
        assert!(!engine.is_ready());
        assert_eq!(engine.call_count(), 1);
    }

    #[test]
    fn test_joined_text_skips_blank_segments() {
        let output = AsrOutput {
            segments: vec![
                TranscriptSegment::new(" Hello", 0.0, 1.0),
                TranscriptSegment::new("  ", 1.0, 2.0),
                TranscriptSegment::new("world ", 2.0, 3.0),
            ],
            language: None,
            language_probability: None,
            duration_s: 3.0,
        };
        assert_eq!(output.joined_text(), "Hello world");
    }

    #[test]
    fn test_engine_shared_through_arc() {
        let engine: Arc<dyn AsrEngine> = Arc::new(MockAsrEngine::new());
        assert_eq!(engine.model_name(), "mock");
        assert!(engine.is_ready());
    }
}
