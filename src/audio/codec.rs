//! Audio file decoding for the one-shot file path.
//!
//! Container conversion is an external concern; the service only needs to
//! turn a finished file into mono f32 PCM at the engine's rate and read
//! its signal statistics. [`WavCodec`] covers WAV via hound; other
//! containers come from an out-of-process converter implementing
//! [`AudioCodec`].

use crate::audio::analysis::{AudioStats, analyze_samples};
use crate::error::{Result, ScribedError};
use std::path::Path;

/// File-level analysis: signal statistics plus container properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileAnalysis {
    pub stats: AudioStats,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decodes audio files into engine-ready PCM.
pub trait AudioCodec: Send + Sync {
    /// Reads signal statistics without keeping the samples.
    fn analyze(&self, path: &Path) -> Result<FileAnalysis>;

    /// Decodes to mono f32 samples at `target_rate`.
    fn resample_to_pcm(&self, path: &Path, target_rate: u32) -> Result<Vec<f32>>;
}

/// WAV decoder with mono mixdown and linear resampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl WavCodec {
    pub fn new() -> Self {
        Self
    }

    fn read_mono(&self, path: &Path) -> Result<(Vec<f32>, u32, u16)> {
        let mut reader = hound::WavReader::open(path).map_err(|e| ScribedError::Codec {
            message: format!("Failed to open WAV file {}: {}", path.display(), e),
        })?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ScribedError::Codec {
                    message: format!("Failed to read WAV samples: {}", e),
                })?,
            hound::SampleFormat::Int => reader
                .samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ScribedError::Codec {
                    message: format!("Failed to read WAV samples: {}", e),
                })?
                .into_iter()
                .map(|s| s as f32 / 32768.0)
                .collect(),
        };

        let mono = if spec.channels > 1 {
            let channels = spec.channels as usize;
            samples
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        } else {
            samples
        };

        Ok((mono, spec.sample_rate, spec.channels))
    }
}

impl AudioCodec for WavCodec {
    fn analyze(&self, path: &Path) -> Result<FileAnalysis> {
        let (samples, sample_rate, channels) = self.read_mono(path)?;
        Ok(FileAnalysis {
            stats: analyze_samples(&samples, sample_rate),
            sample_rate,
            channels,
        })
    }

    fn resample_to_pcm(&self, path: &Path, target_rate: u32) -> Result<Vec<f32>> {
        let (samples, source_rate, _) = self.read_mono(path)?;
        Ok(resample(&samples, source_rate, target_rate))
    }
}

/// Simple linear-interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let index = source_pos as usize;
            let frac = (source_pos - index as f64) as f32;

            let a = samples[index.min(samples.len() - 1)];
            let b = samples[(index + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_analyze_reads_stats_and_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &vec![0.5f32; 16000], 16000, 1);

        let analysis = WavCodec::new().analyze(&path).unwrap();
        assert_eq!(analysis.sample_rate, 16000);
        assert_eq!(analysis.channels, 1);
        assert!((analysis.stats.duration_s - 1.0).abs() < 1e-9);
        assert!((analysis.stats.max_amplitude - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_mixed_down_to_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        // Interleaved L/R frames of 0.2 and 0.6 average to 0.4.
        let frames: Vec<f32> = (0..1000).flat_map(|_| [0.2f32, 0.6f32]).collect();
        write_wav(&path, &frames, 16000, 2);

        let samples = WavCodec::new().resample_to_pcm(&path, 16000).unwrap();
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().all(|&s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_resample_halves_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hi_rate.wav");
        write_wav(&path, &vec![0.3f32; 32000], 32000, 1);

        let samples = WavCodec::new().resample_to_pcm(&path, 16000).unwrap();
        assert_eq!(samples.len(), 16000);
        assert!((samples[8000] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_codec_error() {
        let result = WavCodec::new().analyze(Path::new("/nonexistent/missing.wav"));
        assert!(matches!(result, Err(ScribedError::Codec { .. })));
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }
}
