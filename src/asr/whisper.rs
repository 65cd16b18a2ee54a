//! Whisper-based implementation of the engine interface.
//!
//! # Feature Gate
//!
//! Requires the `whisper` feature (enabled by default) and cmake to build.
//! Without the feature a stub is compiled that reports not-ready and fails
//! every invocation with an actionable message.

use crate::asr::{AsrEngine, AsrOutput, VadMode};
use crate::error::{Result, ScribedError};
use crate::streaming::types::TranscriptSegment;
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file.
    pub model_path: PathBuf,
    /// Language code, or "auto" to detect.
    pub language: String,
    /// Inference threads (None = library default).
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: "en".to_string(),
            threads: None,
        }
    }
}

/// Whisper engine backed by whisper-rs.
///
/// The context is wrapped in a Mutex; invocations are serialized, which
/// also serializes GPU/CPU inference the way the model requires.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

/// Whisper engine placeholder compiled without the `whisper` feature.
#[cfg(not(feature = "whisper"))]
pub struct WhisperEngine {
    config: WhisperConfig,
    model_name: String,
}

impl WhisperEngine {
    fn model_name_from_path(config: &WhisperConfig) -> Result<String> {
        if !config.model_path.exists() {
            return Err(ScribedError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }
        Ok(config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string())
    }

    /// Engine configuration.
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Loads a model from disk.
    ///
    /// # Errors
    /// `ModelNotFound` when the file is missing, `Asr` when loading fails.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Route whisper.cpp's own logging away from stderr (once).
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let model_name = Self::model_name_from_path(&config)?;

        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| ScribedError::Asr {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| ScribedError::Asr {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Creates the stub; only validates that the model file exists.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        let model_name = Self::model_name_from_path(&config)?;
        Ok(Self { config, model_name })
    }
}

#[cfg(feature = "whisper")]
impl AsrEngine for WhisperEngine {
    fn transcribe(&self, samples: &[f32], sample_rate: u32, vad: VadMode) -> Result<AsrOutput> {
        let context = self.context.lock().map_err(|e| ScribedError::Asr {
            message: format!("Failed to acquire context lock: {}", e),
        })?;

        let mut state = context.create_state().map_err(|e| ScribedError::Asr {
            message: format!("Failed to create Whisper state: {}", e),
        })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.config.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        // Each chunk stands alone; overlap already provides continuity.
        params.set_no_context(true);
        params.set_temperature(0.0);

        match vad {
            VadMode::Lenient(_) => {
                params.set_suppress_blank(true);
                params.set_no_speech_thold(0.6);
            }
            VadMode::Disabled => {
                params.set_suppress_blank(false);
                params.set_no_speech_thold(1.0);
            }
        }

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state.full(params, samples).map_err(|e| ScribedError::Asr {
            message: format!("Whisper inference failed: {}", e),
        })?;

        let lang_id = state.full_lang_id_from_state();
        let language = whisper_rs::get_lang_str(lang_id).map(|s| s.to_string());

        // Segment timestamps arrive in centiseconds.
        let mut segments = Vec::new();
        for segment in state.as_iter() {
            let text = segment.to_string();
            if text.trim().is_empty() {
                continue;
            }
            segments.push(TranscriptSegment::new(
                text,
                segment.start_timestamp() as f64 / 100.0,
                segment.end_timestamp() as f64 / 100.0,
            ));
        }

        Ok(AsrOutput {
            segments,
            language,
            language_probability: None,
            duration_s: samples.len() as f64 / sample_rate as f64,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl AsrEngine for WhisperEngine {
    fn transcribe(&self, _samples: &[f32], _sample_rate: u32, _vad: VadMode) -> Result<AsrOutput> {
        Err(ScribedError::Asr {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_config_default() {
        let config = WhisperConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/ggml-base.bin"));
        assert_eq!(config.language, "en");
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_engine_new_fails_for_missing_model() {
        let config = WhisperConfig {
            model_path: PathBuf::from("/nonexistent/model.bin"),
            language: "en".to_string(),
            threads: None,
        };

        let result = WhisperEngine::new(config);
        match result {
            Err(ScribedError::ModelNotFound { path }) => {
                assert_eq!(path, "/nonexistent/model.bin");
            }
            _ => panic!("Expected ModelNotFound error"),
        }
    }

    #[test]
    fn test_model_name_extraction() {
        let dir = tempfile::TempDir::new().unwrap();
        let model_path = dir.path().join("ggml-base.bin");
        std::fs::write(&model_path, b"fake model data").unwrap();

        let config = WhisperConfig {
            model_path,
            language: "en".to_string(),
            threads: None,
        };

        // With the whisper feature this fails later, at model parse; the
        // name extraction itself is what this covers.
        assert_eq!(
            WhisperEngine::model_name_from_path(&config).unwrap(),
            "ggml-base"
        );
    }

    #[test]
    fn test_engine_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<WhisperEngine>();
        assert_sync::<WhisperEngine>();
    }
}
