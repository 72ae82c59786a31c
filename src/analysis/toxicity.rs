// ABOUTME: Toxicity classification behind the ToxicityClassifier trait
// ABOUTME: Default classifier combines per-term weights of an English/French insult lexicon

use super::words;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToxicityLabel {
    Toxic,
    Clean,
}

/// Classifier output: the top label and its confidence in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToxicityVerdict {
    pub label: ToxicityLabel,
    pub score: f64,
}

impl ToxicityVerdict {
    pub fn is_toxic(&self) -> bool {
        self.label == ToxicityLabel::Toxic
    }
}

pub trait ToxicityClassifier: Send + Sync {
    fn classify(&self, text: &str) -> ToxicityVerdict;
}

const TERMS: &[(&str, f64)] = &[
    ("fuck", 0.8),
    ("fucking", 0.75),
    ("shit", 0.6),
    ("bitch", 0.85),
    ("asshole", 0.85),
    ("bastard", 0.8),
    ("idiot", 0.6),
    ("moron", 0.7),
    ("stupid", 0.45),
    ("dumb", 0.4),
    ("crap", 0.4),
    ("loser", 0.5),
    ("retard", 0.9),
    ("connard", 0.85),
    ("connasse", 0.85),
    ("con", 0.55),
    ("conne", 0.6),
    ("putain", 0.6),
    ("merde", 0.55),
    ("salope", 0.9),
    ("enculé", 0.9),
    ("abruti", 0.65),
    ("débile", 0.5),
    ("crétin", 0.6),
    ("nique", 0.8),
    ("pute", 0.9),
];

/// Lexicon classifier: each matched term contributes independently, so
/// the score is `1 - Π(1 - weight)` over matches
#[derive(Debug, Clone)]
pub struct LexiconToxicity {
    weights: HashMap<&'static str, f64>,
}

impl Default for LexiconToxicity {
    fn default() -> Self {
        Self {
            weights: TERMS.iter().copied().collect(),
        }
    }
}

impl LexiconToxicity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToxicityClassifier for LexiconToxicity {
    fn classify(&self, text: &str) -> ToxicityVerdict {
        let clean_probability = words(text)
            .filter_map(|w| self.weights.get(w.to_lowercase().as_str()))
            .fold(1.0, |acc, weight| acc * (1.0 - weight));
        let toxic = 1.0 - clean_probability;

        if toxic >= 0.5 {
            ToxicityVerdict {
                label: ToxicityLabel::Toxic,
                score: toxic,
            }
        } else {
            ToxicityVerdict {
                label: ToxicityLabel::Clean,
                score: clean_probability,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> ToxicityVerdict {
        LexiconToxicity::new().classify(text)
    }

    #[test]
    fn test_clean_message() {
        let v = classify("See you at the climbing gym tonight");
        assert_eq!(v.label, ToxicityLabel::Clean);
        assert_eq!(v.score, 1.0);
    }

    #[test]
    fn test_strong_insult_is_toxic_above_moderation_threshold() {
        let v = classify("you are an asshole");
        assert!(v.is_toxic());
        assert!(v.score > 0.7);
    }

    #[test]
    fn test_mild_word_is_toxic_but_below_moderation_threshold() {
        let v = classify("quel idiot");
        assert!(v.is_toxic());
        assert!(v.score <= 0.7);
    }

    #[test]
    fn test_matches_accumulate() {
        let single = classify("stupid");
        let double = classify("stupid dumb crap");
        assert_eq!(single.label, ToxicityLabel::Clean);
        assert!(double.is_toxic());
        assert!(double.score > 0.7);
    }

    #[test]
    fn test_case_insensitive_french() {
        assert!(classify("Espèce de CONNARD").score > 0.7);
    }
}
