//! Default configuration constants for scribed.
//!
//! Shared across configuration types so the daemon, tests, and the config
//! file schema agree on one set of values.

/// Default audio sample rate in Hz.
///
/// 16kHz is what the transcription engine expects; any other input rate
/// must be resampled by the codec layer before samples reach a stream
/// buffer.
pub const SAMPLE_RATE: u32 = 16_000;

/// Target chunk duration in seconds.
///
/// A stream buffer emits a chunk once it holds this much audio.
pub const CHUNK_DURATION_S: f64 = 30.0;

/// Minimum buffered duration (seconds) for a time-based flush.
///
/// When a full chunk has not accumulated but this much audio is waiting
/// and a chunk period has elapsed since the last extraction, the buffer
/// flushes what it has.
pub const MIN_CHUNK_DURATION_S: f64 = 2.0;

/// Overlap retained between consecutive chunks, in seconds.
///
/// The tail of each extracted chunk is reinserted at the buffer head so a
/// word spanning a chunk boundary is seen whole by the next pass.
pub const OVERLAP_DURATION_S: f64 = 1.0;

/// Processing loop polling interval in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Seconds of accumulator inactivity before a partial sentence is emitted.
pub const SENTENCE_TIMEOUT_S: f64 = 1.0;

/// Minimum segment duration (seconds) accepted by the accumulator.
pub const MIN_SEGMENT_DURATION_S: f64 = 1.0;

/// Capacity of the accumulator's recent-segment history ring.
pub const SEGMENT_HISTORY_CAPACITY: usize = 10;

/// Minimum chunk duration (seconds) worth sending to the engine.
pub const GATE_MIN_DURATION_S: f64 = 0.05;

/// Maximum silence percentage before a chunk is discarded as empty air.
pub const GATE_MAX_SILENCE_PCT: f32 = 99.5;

/// Peak-amplitude floor below which a chunk is treated as too weak.
///
/// Inherited verbatim from the service this replaces; on a normalized
/// [-1, 1] signal 0.5 is aggressive, so deployments tune it per stream
/// type rather than relying on the default.
pub const GATE_MIN_AMPLITUDE: f32 = 0.5;

/// RMS floor for microphone streams.
pub const GATE_MIN_RMS_MICROPHONE: f32 = 0.01;

/// RMS floor for system-audio streams.
///
/// Loopback capture is cleaner than a microphone, so quiet passages sit
/// lower without being noise.
pub const GATE_MIN_RMS_SYSTEM: f32 = 0.005;

/// Per-sample absolute amplitude below which a sample counts as silent.
pub const SILENCE_SAMPLE_THRESHOLD: f32 = 0.01;

/// Wall-clock budget in seconds for a single engine invocation.
pub const ASR_TIMEOUT_S: u64 = 60;

/// Default TCP port for the command socket.
pub const PORT: u16 = 9001;

/// Default listen address.
pub const HOST: &str = "127.0.0.1";

/// Engine output markers that carry no speech content.
///
/// Stripped from segment text before accumulation; a segment that is
/// nothing but markers is dropped.
pub const NON_SPEECH_MARKERS: &[&str] = &[
    "[BLANK_AUDIO]",
    "[INAUDIBLE]",
    "[MUSIC]",
    "[APPLAUSE]",
    "[LAUGHTER]",
    "(BLANK_AUDIO)",
    "(inaudible)",
];

/// Characters that terminate a sentence.
pub const SENTENCE_TERMINATORS: &[char] = &['.', '?', '!'];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_thresholds_are_ordered() {
        assert!(MIN_CHUNK_DURATION_S < CHUNK_DURATION_S);
        assert!(OVERLAP_DURATION_S < MIN_CHUNK_DURATION_S);
    }

    #[test]
    fn gate_floors_are_positive() {
        assert!(GATE_MIN_DURATION_S > 0.0);
        assert!(GATE_MIN_AMPLITUDE > 0.0);
        assert!(GATE_MIN_RMS_MICROPHONE > GATE_MIN_RMS_SYSTEM);
    }
}
