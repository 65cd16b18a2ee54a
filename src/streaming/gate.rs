//! Signal-quality gate applied to every chunk before transcription.
//!
//! Transcribing near-silence wastes the engine's time and produces
//! hallucinated text; the gate rejects such chunks from four cheap
//! statistics and the pipeline reports an empty result instead.

use crate::audio::analysis::AudioStats;
use crate::defaults;
use crate::streaming::types::StreamType;
use serde::{Deserialize, Serialize};

/// Per-stream-type thresholds for the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Chunks shorter than this (seconds) cannot contain speech.
    pub min_duration_s: f64,
    /// Chunks more silent than this percentage are empty air.
    pub max_silence_pct: f32,
    /// Peak-amplitude floor.
    pub min_amplitude: f32,
    /// RMS floor.
    pub min_rms: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::microphone()
    }
}

impl GateConfig {
    /// Defaults for microphone capture.
    pub fn microphone() -> Self {
        Self {
            min_duration_s: defaults::GATE_MIN_DURATION_S,
            max_silence_pct: defaults::GATE_MAX_SILENCE_PCT,
            min_amplitude: defaults::GATE_MIN_AMPLITUDE,
            min_rms: defaults::GATE_MIN_RMS_MICROPHONE,
        }
    }

    /// Defaults for system-audio (loopback) capture.
    pub fn system() -> Self {
        Self {
            min_rms: defaults::GATE_MIN_RMS_SYSTEM,
            ..Self::microphone()
        }
    }
}

/// Why a chunk was not sent to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Too short to contain speech.
    TooShort,
    /// Near-total silence.
    NearSilence,
    /// Peak or RMS below the configured floor.
    LowSignal,
}

impl RejectReason {
    /// Stable name used in preservation tags and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TooShort => "too_short",
            RejectReason::NearSilence => "near_silence",
            RejectReason::LowSignal => "low_signal",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless chunk classifier with per-stream-type thresholds.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    microphone: GateConfig,
    system: GateConfig,
}

impl QualityGate {
    /// Creates a gate with default thresholds for both stream types.
    pub fn new() -> Self {
        Self {
            microphone: GateConfig::microphone(),
            system: GateConfig::system(),
        }
    }

    /// Creates a gate with explicit per-type thresholds.
    pub fn with_configs(microphone: GateConfig, system: GateConfig) -> Self {
        Self { microphone, system }
    }

    /// Thresholds in effect for a stream type.
    pub fn config_for(&self, stream_type: StreamType) -> &GateConfig {
        match stream_type {
            StreamType::Microphone => &self.microphone,
            StreamType::System => &self.system,
        }
    }

    /// Classifies a chunk; `None` means it is worth transcribing.
    pub fn evaluate(&self, stats: &AudioStats, stream_type: StreamType) -> Option<RejectReason> {
        let config = self.config_for(stream_type);

        if stats.duration_s < config.min_duration_s {
            return Some(RejectReason::TooShort);
        }
        if stats.silence_percentage > config.max_silence_pct {
            return Some(RejectReason::NearSilence);
        }
        if stats.max_amplitude < config.min_amplitude || stats.rms_level < config.min_rms {
            return Some(RejectReason::LowSignal);
        }

        None
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new()
    }
}
