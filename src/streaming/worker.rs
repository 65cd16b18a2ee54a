//! Background processing loop.
//!
//! One worker polls every active stream on a fixed cadence, extracting
//! ready chunks and driving them through the processor. A failure in one
//! stream's cycle is logged and skipped; the loop itself only stops when
//! told to.

use crate::streaming::processor::ChunkProcessor;
use crate::streaming::registry::StreamRegistry;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Single background worker draining ready chunks across all streams.
pub struct ProcessingLoop {
    registry: Arc<StreamRegistry>,
    processor: Arc<ChunkProcessor>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl ProcessingLoop {
    /// Creates a loop over a registry and processor.
    pub fn new(
        registry: Arc<StreamRegistry>,
        processor: Arc<ChunkProcessor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            processor,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the worker task and returns its handle.
    ///
    /// The handle must be shut down and joined before the registry it
    /// polls is torn down.
    pub fn spawn(self) -> ProcessingLoopHandle {
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(self.run());

        ProcessingLoopHandle { running, handle }
    }

    async fn run(self) {
        debug!(poll_ms = self.poll_interval.as_millis() as u64, "processing loop started");

        while self.running.load(Ordering::SeqCst) {
            for stream in self.registry.active() {
                let chunk = {
                    let mut buffer = stream
                        .buffer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    buffer.get_chunk_if_ready()
                };

                if let Some(chunk) = chunk {
                    debug!(
                        stream_id = %stream.id,
                        chunk_id = chunk.chunk_id,
                        samples = chunk.samples.len(),
                        "processing chunk"
                    );
                    // One stream's bad cycle must not take the loop down.
                    if let Err(e) = self.processor.process_chunk(&stream, chunk).await {
                        warn!(stream_id = %stream.id, "chunk processing failed: {}", e);
                    }
                }

                self.processor.check_timeout(&stream);
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        debug!("processing loop stopped");
    }
}

/// Handle to a running processing loop.
pub struct ProcessingLoopHandle {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProcessingLoopHandle {
    /// Signals the loop to stop after its current cycle.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// True until shutdown is requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Waits for the loop to finish its last cycle.
    pub async fn join(self) {
        self.shutdown();
        if let Err(e) = self.handle.await {
            warn!("processing loop task failed to join: {}", e);
        }
    }
}
