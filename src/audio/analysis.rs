//! Signal statistics and raw PCM decoding.
//!
//! The quality gate classifies chunks on four cheap statistics: duration,
//! peak amplitude, RMS level, and silence percentage.

use crate::defaults;
use crate::error::{Result, ScribedError};

/// Summary statistics for a block of mono f32 samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioStats {
    /// Length of the block in seconds.
    pub duration_s: f64,
    /// Largest absolute sample value.
    pub max_amplitude: f32,
    /// Root-mean-square level.
    pub rms_level: f32,
    /// Percentage of samples below the per-sample silence threshold.
    pub silence_percentage: f32,
}

impl AudioStats {
    /// Stats for an empty block: zero signal, fully silent.
    pub fn empty() -> Self {
        Self {
            duration_s: 0.0,
            max_amplitude: 0.0,
            rms_level: 0.0,
            silence_percentage: 100.0,
        }
    }
}

/// Computes [`AudioStats`] over a block of samples.
pub fn analyze_samples(samples: &[f32], sample_rate: u32) -> AudioStats {
    if samples.is_empty() {
        return AudioStats::empty();
    }

    let mut max_amplitude = 0.0f32;
    let mut sum_squares = 0.0f64;
    let mut silent = 0usize;

    for &s in samples {
        let abs = s.abs();
        if abs > max_amplitude {
            max_amplitude = abs;
        }
        sum_squares += (s as f64) * (s as f64);
        if abs < defaults::SILENCE_SAMPLE_THRESHOLD {
            silent += 1;
        }
    }

    AudioStats {
        duration_s: samples.len() as f64 / sample_rate as f64,
        max_amplitude,
        rms_level: (sum_squares / samples.len() as f64).sqrt() as f32,
        silence_percentage: (silent as f32 / samples.len() as f32) * 100.0,
    }
}

/// Decodes little-endian f32 mono PCM bytes into samples.
///
/// The payload length must be a multiple of 4; a misaligned payload is a
/// codec error rather than a silent truncation.
pub fn decode_f32_pcm(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(ScribedError::Codec {
            message: format!(
                "PCM payload length {} is not a multiple of 4 bytes",
                bytes.len()
            ),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Encodes samples as little-endian f32 PCM bytes.
pub fn encode_f32_pcm(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_empty_block() {
        let stats = analyze_samples(&[], 16000);
        assert_eq!(stats.duration_s, 0.0);
        assert_eq!(stats.silence_percentage, 100.0);
    }

    #[test]
    fn test_analyze_silence() {
        let samples = vec![0.0f32; 16000];
        let stats = analyze_samples(&samples, 16000);
        assert!((stats.duration_s - 1.0).abs() < 1e-9);
        assert_eq!(stats.max_amplitude, 0.0);
        assert_eq!(stats.rms_level, 0.0);
        assert_eq!(stats.silence_percentage, 100.0);
    }

    #[test]
    fn test_analyze_constant_signal() {
        let samples = vec![0.5f32; 8000];
        let stats = analyze_samples(&samples, 16000);
        assert!((stats.duration_s - 0.5).abs() < 1e-9);
        assert!((stats.max_amplitude - 0.5).abs() < 1e-6);
        assert!((stats.rms_level - 0.5).abs() < 1e-6);
        assert_eq!(stats.silence_percentage, 0.0);
    }

    #[test]
    fn test_analyze_half_silent() {
        let mut samples = vec![0.0f32; 1000];
        samples.extend(vec![0.8f32; 1000]);
        let stats = analyze_samples(&samples, 16000);
        assert!((stats.silence_percentage - 50.0).abs() < 0.1);
        assert!((stats.max_amplitude - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_roundtrip() {
        let samples = vec![0.0f32, 0.25, -0.5, 1.0];
        let bytes = encode_f32_pcm(&samples);
        let decoded = decode_f32_pcm(&bytes).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_decode_rejects_misaligned_payload() {
        let result = decode_f32_pcm(&[0u8, 1, 2]);
        assert!(matches!(result, Err(ScribedError::Codec { .. })));
    }

    #[test]
    fn test_decode_empty_payload() {
        let decoded = decode_f32_pcm(&[]).unwrap();
        assert!(decoded.is_empty());
    }
}
