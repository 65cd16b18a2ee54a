//! Sentence accumulator over engine segments.
//!
//! Collects cleaned segment text until terminal punctuation or a timeout,
//! then emits one sentence-bounded update. Duplicate segments caused by
//! the chunk-overlap window re-covering the same audio are suppressed by
//! fingerprint.

use crate::defaults;
use crate::streaming::types::{StreamType, TranscriptSegment, TranscriptUpdate};
use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

/// Configuration for a transcript accumulator.
#[derive(Debug, Clone, Copy)]
pub struct AccumulatorConfig {
    /// Inactivity (seconds) before a partial sentence is force-emitted.
    pub sentence_timeout_s: f64,
    /// Segments shorter than this (seconds) are dropped as noise.
    pub min_segment_duration_s: f64,
    /// Capacity of the recent-segment history ring.
    pub history_capacity: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            sentence_timeout_s: defaults::SENTENCE_TIMEOUT_S,
            min_segment_duration_s: defaults::MIN_SEGMENT_DURATION_S,
            history_capacity: defaults::SEGMENT_HISTORY_CAPACITY,
        }
    }
}

/// Per-stream sentence state machine.
///
/// Either empty or holding a partial sentence; every emission returns it
/// to empty. Malformed input never errors; it is dropped, leaving only
/// the timing bookkeeping touched.
pub struct TranscriptAccumulator {
    stream_id: String,
    stream_type: StreamType,
    config: AccumulatorConfig,
    current_sentence: String,
    sentence_start: f64,
    last_update: Instant,
    last_fingerprint: Option<u64>,
    /// Recently accepted segments, oldest evicted first.
    history: VecDeque<TranscriptSegment>,
}

impl TranscriptAccumulator {
    /// Creates an accumulator with default thresholds.
    pub fn new(stream_id: impl Into<String>, stream_type: StreamType) -> Self {
        Self::with_config(stream_id, stream_type, AccumulatorConfig::default())
    }

    /// Creates an accumulator with custom thresholds.
    pub fn with_config(
        stream_id: impl Into<String>,
        stream_type: StreamType,
        config: AccumulatorConfig,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            stream_type,
            config,
            current_sentence: String::new(),
            sentence_start: 0.0,
            last_update: Instant::now(),
            last_fingerprint: None,
            history: VecDeque::with_capacity(config.history_capacity),
        }
    }

    /// True while a partial sentence is held.
    pub fn is_accumulating(&self) -> bool {
        !self.current_sentence.is_empty()
    }

    /// Number of segments retained in the history ring.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Feeds one segment; returns an update when a sentence completes.
    pub fn add_segment(&mut self, segment: &TranscriptSegment) -> Option<TranscriptUpdate> {
        // Timing bookkeeping happens no matter what the segment contains.
        self.last_update = Instant::now();

        let text = clean_text(&segment.text);
        if text.is_empty() || segment.duration() < self.config.min_segment_duration_s {
            return None;
        }

        let fingerprint = segment_fingerprint(&text, segment.start, segment.end);
        if self.last_fingerprint == Some(fingerprint) {
            return None;
        }
        self.last_fingerprint = Some(fingerprint);

        if self.current_sentence.is_empty() {
            self.sentence_start = segment.start;
        } else {
            self.current_sentence.push(' ');
        }
        self.current_sentence.push_str(&text);

        self.remember(TranscriptSegment {
            text,
            start: segment.start,
            end: segment.end,
        });

        if self
            .current_sentence
            .ends_with(defaults::SENTENCE_TERMINATORS)
        {
            return Some(self.emit(segment.end));
        }

        None
    }

    /// Emits a held partial sentence once the inactivity timeout passes.
    ///
    /// The end time is estimated as `sentence_start + timeout` since no
    /// terminal segment arrived to supply one.
    pub fn check_timeout(&mut self) -> Option<TranscriptUpdate> {
        if self.current_sentence.is_empty() {
            return None;
        }
        if self.last_update.elapsed().as_secs_f64() < self.config.sentence_timeout_s {
            return None;
        }
        let end = self.sentence_start + self.config.sentence_timeout_s;
        Some(self.emit(end))
    }

    /// Force-emits a held partial sentence regardless of timing.
    ///
    /// Called when a stream stops, after the final drain pass, so text
    /// already accumulated is not lost with the stream.
    pub fn flush(&mut self) -> Option<TranscriptUpdate> {
        if self.current_sentence.is_empty() {
            return None;
        }
        let end = self.sentence_start + self.config.sentence_timeout_s;
        Some(self.emit(end))
    }

    fn emit(&mut self, end: f64) -> TranscriptUpdate {
        let text = std::mem::take(&mut self.current_sentence)
            .trim()
            .to_string();
        self.last_update = Instant::now();
        TranscriptUpdate {
            stream_id: self.stream_id.clone(),
            text,
            start: self.sentence_start,
            end,
            stream_type: self.stream_type,
        }
    }

    fn remember(&mut self, segment: TranscriptSegment) {
        if self.history.len() == self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(segment);
    }
}

/// Strips non-speech markers and surrounding whitespace.
fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for marker in defaults::NON_SPEECH_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned.trim().to_string()
}

fn segment_fingerprint(text: &str, start: f64, end: f64) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    start.to_bits().hash(&mut hasher);
    end.to_bits().hash(&mut hasher);
    hasher.finish()
}
