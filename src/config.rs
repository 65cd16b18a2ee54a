//! TOML configuration with environment overrides.

use crate::asr::whisper::WhisperConfig;
use crate::defaults;
use crate::error::Result;
use crate::streaming::accumulator::AccumulatorConfig;
use crate::streaming::buffer::BufferConfig;
use crate::streaming::gate::{GateConfig, QualityGate};
use crate::streaming::processor::ProcessorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub gate: GateSettings,
    pub asr: AsrSettings,
    pub pipeline: PipelineSettings,
    pub preservation: PreservationSettings,
}

/// Listener and instance-lock configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Lock file path; None uses the system temp directory.
    pub lock_file: Option<PathBuf>,
}

/// Stream buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub chunk_duration_s: f64,
    pub min_chunk_duration_s: f64,
    pub overlap_duration_s: f64,
}

/// Quality-gate thresholds per stream type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateSettings {
    pub microphone: GateConfig,
    pub system: GateConfig,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AsrSettings {
    pub model_path: PathBuf,
    pub language: String,
    pub threads: Option<usize>,
    pub timeout_s: u64,
}

/// Worker and accumulator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub poll_interval_ms: u64,
    pub sentence_timeout_s: f64,
    pub min_segment_duration_s: f64,
    pub segment_history: usize,
}

/// Rejected-chunk preservation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PreservationSettings {
    pub enabled: bool,
    pub directory: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            lock_file: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_duration_s: defaults::CHUNK_DURATION_S,
            min_chunk_duration_s: defaults::MIN_CHUNK_DURATION_S,
            overlap_duration_s: defaults::OVERLAP_DURATION_S,
        }
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            microphone: GateConfig::microphone(),
            system: GateConfig::system(),
        }
    }
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: "en".to_string(),
            threads: None,
            timeout_s: defaults::ASR_TIMEOUT_S,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            sentence_timeout_s: defaults::SENTENCE_TIMEOUT_S,
            min_segment_duration_s: defaults::MIN_SEGMENT_DURATION_S,
            segment_history: defaults::SEGMENT_HISTORY_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    ///
    /// Only a missing file falls back; invalid TOML still errors.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIBED_HOST → server.host
    /// - SCRIBED_PORT → server.port
    /// - SCRIBED_MODEL → asr.model_path
    /// - SCRIBED_LANGUAGE → asr.language
    /// - SCRIBED_PRESERVE_DIR → preservation.directory (and enables it)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("SCRIBED_HOST")
            && !host.is_empty()
        {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SCRIBED_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
        if let Ok(model) = std::env::var("SCRIBED_MODEL")
            && !model.is_empty()
        {
            self.asr.model_path = PathBuf::from(model);
        }
        if let Ok(language) = std::env::var("SCRIBED_LANGUAGE")
            && !language.is_empty()
        {
            self.asr.language = language;
        }
        if let Ok(dir) = std::env::var("SCRIBED_PRESERVE_DIR")
            && !dir.is_empty()
        {
            self.preservation.enabled = true;
            self.preservation.directory = Some(PathBuf::from(dir));
        }
        self
    }

    /// Stream buffer configuration derived from the audio section.
    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            sample_rate: self.audio.sample_rate,
            chunk_duration_s: self.audio.chunk_duration_s,
            min_chunk_duration_s: self.audio.min_chunk_duration_s,
            overlap_duration_s: self.audio.overlap_duration_s,
        }
    }

    /// Accumulator configuration derived from the pipeline section.
    pub fn accumulator_config(&self) -> AccumulatorConfig {
        AccumulatorConfig {
            sentence_timeout_s: self.pipeline.sentence_timeout_s,
            min_segment_duration_s: self.pipeline.min_segment_duration_s,
            history_capacity: self.pipeline.segment_history,
        }
    }

    /// Processor configuration derived from audio and engine sections.
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            sample_rate: self.audio.sample_rate,
            asr_timeout: Duration::from_secs(self.asr.timeout_s),
        }
    }

    /// Quality gate built from the per-type threshold sections.
    pub fn quality_gate(&self) -> QualityGate {
        QualityGate::with_configs(self.gate.microphone, self.gate.system)
    }

    /// Engine configuration derived from the asr section.
    pub fn whisper_config(&self) -> WhisperConfig {
        WhisperConfig {
            model_path: self.asr.model_path.clone(),
            language: self.asr.language.clone(),
            threads: self.asr.threads,
        }
    }

    /// Worker polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.pipeline.poll_interval_ms)
    }

    /// Lock file path, defaulting to the system temp directory.
    pub fn lock_file(&self) -> PathBuf {
        self.server
            .lock_file
            .clone()
            .unwrap_or_else(crate::instance::InstanceLock::default_path)
    }
}
