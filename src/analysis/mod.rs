// ABOUTME: Text analysis used by feature modules: topic extraction, sentiment, toxicity
// ABOUTME: Scorers sit behind traits so lexicon defaults can be swapped for model-backed ones

pub mod sentiment;
pub mod toxicity;
pub mod topics;

pub use sentiment::{LexiconSentiment, Mood, SentimentScorer};
pub use topics::TopicExtractor;
pub use toxicity::{LexiconToxicity, ToxicityClassifier, ToxicityLabel, ToxicityVerdict};

use regex::Regex;
use std::sync::LazyLock;

static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("invalid word pattern regex"));

/// Split text into word tokens (letters and digits), keeping the original case
pub(crate) fn words(text: &str) -> impl Iterator<Item = &str> {
    WORD_PATTERN.find_iter(text).map(|m| m.as_str())
}
