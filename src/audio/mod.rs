//! Audio analysis and file decoding.

pub mod analysis;
pub mod codec;

pub use analysis::{AudioStats, analyze_samples, decode_f32_pcm, encode_f32_pcm};
pub use codec::{AudioCodec, FileAnalysis, WavCodec};
