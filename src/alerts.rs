//! Keyword alert matching over transcripts.
//!
//! The semantic (embedding-similarity) matcher is an external service;
//! [`LexicalMatcher`] is the in-process baseline so `check_alerts` works
//! without it: exact phrase containment scores 1.0, otherwise the best
//! token-overlap window is scored against the threshold.

use serde::{Deserialize, Serialize};

/// One keyword a client wants flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSpec {
    pub keyword: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_threshold() -> f32 {
    0.7
}

fn default_enabled() -> bool {
    true
}

/// A keyword found in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMatch {
    pub keyword: String,
    /// The transcript window the keyword matched against.
    pub matched_text: String,
    pub similarity: f32,
}

/// Trait for transcript keyword matching.
pub trait AlertMatcher: Send + Sync {
    /// Returns matches for every enabled keyword meeting its threshold.
    fn match_keywords(&self, transcript: &str, keywords: &[KeywordSpec]) -> Vec<AlertMatch>;
}

/// Word-level matcher: containment first, token overlap second.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalMatcher;

impl LexicalMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Best token-overlap score between the keyword and any transcript
    /// window of the same length, with the window text that scored it.
    fn best_window(transcript_words: &[&str], keyword_words: &[String]) -> (f32, String) {
        if keyword_words.is_empty() || transcript_words.len() < keyword_words.len() {
            return (0.0, String::new());
        }

        let mut best = (0.0f32, String::new());
        for window in transcript_words.windows(keyword_words.len()) {
            let hits = keyword_words
                .iter()
                .filter(|kw| window.iter().any(|w| normalize(w) == **kw))
                .count();
            let score = hits as f32 / keyword_words.len() as f32;
            if score > best.0 {
                best = (score, window.join(" "));
            }
        }
        best
    }
}

/// Lowercases and strips punctuation from a word.
fn normalize(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

impl AlertMatcher for LexicalMatcher {
    fn match_keywords(&self, transcript: &str, keywords: &[KeywordSpec]) -> Vec<AlertMatch> {
        let lower = transcript.to_lowercase();
        let transcript_words: Vec<&str> = transcript.split_whitespace().collect();

        let mut matches = Vec::new();
        for spec in keywords.iter().filter(|k| k.enabled) {
            let keyword_lower = spec.keyword.to_lowercase();
            if keyword_lower.trim().is_empty() {
                continue;
            }

            if lower.contains(&keyword_lower) {
                matches.push(AlertMatch {
                    keyword: spec.keyword.clone(),
                    matched_text: containing_window(&transcript_words, &keyword_lower),
                    similarity: 1.0,
                });
                continue;
            }

            let keyword_words: Vec<String> =
                keyword_lower.split_whitespace().map(normalize).collect();
            let (score, window) = Self::best_window(&transcript_words, &keyword_words);
            if score >= spec.threshold && score > 0.0 {
                matches.push(AlertMatch {
                    keyword: spec.keyword.clone(),
                    matched_text: window,
                    similarity: score,
                });
            }
        }
        matches
    }
}

/// A few words of context around the first word of the matched phrase.
fn containing_window(words: &[&str], keyword_lower: &str) -> String {
    let first_keyword_word = keyword_lower.split_whitespace().next().unwrap_or("");
    let position = words
        .iter()
        .position(|w| normalize(w) == normalize(first_keyword_word));

    match position {
        Some(i) => {
            let from = i.saturating_sub(3);
            let to = (i + 4).min(words.len());
            words[from..to].join(" ")
        }
        None => words.join(" "),
    }
}
