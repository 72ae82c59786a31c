// ABOUTME: Compound sentiment scoring in [-1, 1] behind the SentimentScorer trait
// ABOUTME: Default scorer is a small English/French valence lexicon with negation and emphasis rules

use super::words;
use std::collections::HashMap;

/// Scores text on a compound scale from -1 (most negative) to 1 (most positive)
pub trait SentimentScorer: Send + Sync {
    fn compound(&self, text: &str) -> f64;
}

/// Coarse mood of a set of scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Joyful,
    Sad,
    Neutral,
}

impl Mood {
    /// Classify a mean compound score; the neutral band is (-0.05, 0.05)
    pub fn from_score(score: f64) -> Self {
        if score > 0.05 {
            Mood::Joyful
        } else if score < -0.05 {
            Mood::Sad
        } else {
            Mood::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Joyful => "joyful",
            Mood::Sad => "sad",
            Mood::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const VALENCES: &[(&str, f64)] = &[
    // English
    ("love", 3.2),
    ("loved", 2.9),
    ("loves", 2.7),
    ("great", 3.1),
    ("good", 1.9),
    ("happy", 2.7),
    ("awesome", 3.1),
    ("amazing", 2.8),
    ("excellent", 3.2),
    ("nice", 1.8),
    ("fun", 2.3),
    ("funny", 1.9),
    ("lol", 1.8),
    ("haha", 1.6),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("wonderful", 2.7),
    ("best", 3.2),
    ("cool", 1.3),
    ("yay", 2.4),
    ("win", 2.8),
    ("beautiful", 2.9),
    ("glad", 2.0),
    ("excited", 1.9),
    ("perfect", 2.7),
    ("like", 1.5),
    ("enjoy", 2.2),
    ("hate", -2.7),
    ("hated", -3.2),
    ("bad", -2.5),
    ("terrible", -2.1),
    ("awful", -2.0),
    ("sad", -2.1),
    ("angry", -2.3),
    ("worst", -3.1),
    ("horrible", -2.5),
    ("ugly", -2.3),
    ("stupid", -2.4),
    ("annoying", -1.7),
    ("boring", -1.3),
    ("fail", -2.5),
    ("failed", -2.3),
    ("hurt", -2.4),
    ("cry", -2.1),
    ("disappointed", -1.9),
    ("sucks", -1.5),
    ("wtf", -2.8),
    ("broken", -1.9),
    ("sorry", -0.3),
    ("tired", -1.9),
    // French
    ("génial", 3.0),
    ("super", 2.9),
    ("bien", 1.5),
    ("bon", 1.9),
    ("content", 2.0),
    ("contente", 2.0),
    ("heureux", 2.7),
    ("heureuse", 2.7),
    ("merci", 1.9),
    ("bravo", 2.5),
    ("magnifique", 2.9),
    ("adore", 3.0),
    ("parfait", 2.7),
    ("top", 2.0),
    ("triste", -2.1),
    ("nul", -2.0),
    ("nulle", -2.0),
    ("déteste", -2.7),
    ("mauvais", -2.5),
    ("énervé", -2.3),
    ("dommage", -1.5),
    ("fatigué", -1.9),
    ("pire", -3.1),
    ("chiant", -1.7),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "isn", "don", "doesn", "didn", "wasn", "aren", "won", "nothing",
    "pas", "jamais", "rien", "aucun", "aucune",
];

const BOOSTERS: &[&str] = &[
    "very", "really", "so", "extremely", "totally", "absolutely", "très", "vraiment", "trop",
    "tellement", "super",
];

const NEGATION_SCALAR: f64 = -0.74;
const BOOSTER_INCREMENT: f64 = 0.293;
const CAPS_INCREMENT: f64 = 0.733;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const NORMALIZATION_ALPHA: f64 = 15.0;

/// Lexicon-based compound scorer
#[derive(Debug, Clone)]
pub struct LexiconSentiment {
    valences: HashMap<&'static str, f64>,
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self {
            valences: VALENCES.iter().copied().collect(),
        }
    }
}

impl LexiconSentiment {
    pub fn new() -> Self {
        Self::default()
    }

    fn valence(&self, token: &str, preceding: &[String], shouting: bool) -> Option<f64> {
        let lower = token.to_lowercase();
        let mut valence = *self.valences.get(lower.as_str())?;
        let sign = valence.signum();

        if shouting && token.chars().count() > 1 && token.chars().all(|c| !c.is_lowercase()) {
            valence += sign * CAPS_INCREMENT;
        }
        if let Some(prev) = preceding.last() {
            if BOOSTERS.contains(&prev.as_str()) {
                valence += sign * BOOSTER_INCREMENT;
            }
        }
        if preceding
            .iter()
            .rev()
            .take(3)
            .any(|w| NEGATIONS.contains(&w.as_str()))
        {
            valence *= NEGATION_SCALAR;
        }
        Some(valence)
    }
}

impl SentimentScorer for LexiconSentiment {
    fn compound(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = words(text).collect();
        // Capitalized words only count as emphasis when the message is not all caps
        let shouting = tokens
            .iter()
            .any(|t| t.chars().any(|c| c.is_lowercase()));

        let mut preceding: Vec<String> = Vec::with_capacity(tokens.len());
        let mut sum = 0.0;
        for token in &tokens {
            if let Some(v) = self.valence(token, &preceding, shouting) {
                sum += v;
            }
            preceding.push(token.to_lowercase());
        }

        if sum == 0.0 {
            return 0.0;
        }

        let exclamations = text.matches('!').count().min(4) as f64;
        sum += sum.signum() * exclamations * EXCLAMATION_INCREMENT;

        (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
    }
}
