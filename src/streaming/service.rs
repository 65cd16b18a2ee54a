//! Facade tying the registry and processor together.
//!
//! Connection handlers talk to this one type: it owns stream lifecycle
//! including the final drain on stop, so no caller can remove a stream
//! and forget its trailing audio.

use crate::error::Result;
use crate::streaming::processor::{ChunkProcessor, ChunkResult};
use crate::streaming::registry::StreamRegistry;
use crate::streaming::types::{StreamType, TranscriptUpdate};
use std::sync::Arc;
use std::sync::PoisonError;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Stream lifecycle operations shared by all connections.
pub struct TranscriptionService {
    registry: Arc<StreamRegistry>,
    processor: Arc<ChunkProcessor>,
}

impl TranscriptionService {
    pub fn new(registry: Arc<StreamRegistry>, processor: Arc<ChunkProcessor>) -> Self {
        Self {
            registry,
            processor,
        }
    }

    /// The registry this service fronts.
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// The processor this service drives.
    pub fn processor(&self) -> &Arc<ChunkProcessor> {
        &self.processor
    }

    /// Subscribes to sentence updates across all streams.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptUpdate> {
        self.processor.subscribe()
    }

    /// Registers a new stream.
    pub fn start_stream(&self, id: &str, stream_type: StreamType) -> Result<()> {
        self.registry.start_stream(id, stream_type)?;
        info!(stream_id = id, stream_type = %stream_type, "stream started");
        Ok(())
    }

    /// Stops a stream, draining any residual audio first.
    ///
    /// Trailing samples get one forced engine pass, even an underfilled
    /// chunk, before the stream's state is dropped. Returns the final
    /// pass's result, if there was residual audio.
    pub async fn stop_stream(&self, id: &str) -> Result<Option<ChunkResult>> {
        let stream = self.registry.remove_stream(id)?;

        let residual = {
            let mut buffer = stream
                .buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let chunk = buffer.take_remaining();
            buffer.clear();
            chunk
        };

        let result = match residual {
            Some(chunk) => {
                debug!(
                    stream_id = id,
                    duration_s = chunk.duration_s(self.processor.sample_rate()),
                    "draining residual audio"
                );
                Some(self.processor.process_chunk(&stream, chunk).await?)
            }
            None => {
                // Nothing buffered; a pending partial sentence still
                // deserves to get out.
                let update = stream
                    .accumulator
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .flush();
                if let Some(update) = update {
                    self.processor.broadcast_one(update);
                }
                None
            }
        };

        info!(stream_id = id, "stream stopped");
        Ok(result)
    }

    /// Appends raw PCM bytes to a stream's buffer.
    pub fn add_chunk(&self, id: &str, data: &[u8]) -> Result<usize> {
        self.registry.add_audio_chunk(id, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::MockAsrEngine;
    use crate::audio::analysis::encode_f32_pcm;
    use crate::error::ScribedError;
    use crate::preserve::NullPreservation;
    use crate::streaming::gate::QualityGate;
    use crate::streaming::processor::ProcessorConfig;
    use crate::streaming::types::TranscriptSegment;

    fn service_with(engine: Arc<MockAsrEngine>) -> TranscriptionService {
        let registry = Arc::new(StreamRegistry::new());
        let processor = Arc::new(ChunkProcessor::new(
            engine,
            QualityGate::new(),
            Arc::new(NullPreservation),
            ProcessorConfig::default(),
        ));
        TranscriptionService::new(registry, processor)
    }

    #[tokio::test]
    async fn test_stop_drains_residual_audio() {
        let engine = Arc::new(MockAsrEngine::with_segments(vec![TranscriptSegment::new(
            "Trailing words.",
            0.0,
            2.0,
        )]));
        let service = service_with(Arc::clone(&engine));
        let mut updates = service.subscribe();

        service.start_stream("s1", StreamType::Microphone).unwrap();
        // 3s of loud audio: far below a full chunk, but it must still be
        // transcribed on stop.
        let bytes = encode_f32_pcm(&vec![0.8f32; 48000]);
        service.add_chunk("s1", &bytes).unwrap();

        let result = service.stop_stream("s1").await.unwrap().unwrap();
        assert_eq!(engine.call_count(), 1);
        assert_eq!(result.text, "Trailing words.");

        let update = updates.try_recv().unwrap();
        assert_eq!(update.text, "Trailing words.");
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_residual_audio() {
        let engine = Arc::new(MockAsrEngine::new());
        let service = service_with(Arc::clone(&engine));

        service.start_stream("s1", StreamType::System).unwrap();
        let result = service.stop_stream("s1").await.unwrap();

        assert!(result.is_none());
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_unknown_stream() {
        let service = service_with(Arc::new(MockAsrEngine::new()));
        let result = service.stop_stream("ghost").await;
        assert!(matches!(result, Err(ScribedError::StreamNotFound { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_start_rejected() {
        let service = service_with(Arc::new(MockAsrEngine::new()));
        service.start_stream("s1", StreamType::Microphone).unwrap();
        let result = service.start_stream("s1", StreamType::Microphone);
        assert!(matches!(
            result,
            Err(ScribedError::StreamAlreadyExists { .. })
        ));
    }
}
