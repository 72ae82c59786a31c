// ABOUTME: Frequency-based topic extraction over a discussion's message texts
// ABOUTME: Lowercased word tokens minus French and English stop words, most frequent first

use super::words;
use std::collections::{HashMap, HashSet};

const STOP_WORDS_EN: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "don", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "s", "same", "she", "should", "so", "some", "such", "t", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
    "yourself", "yourselves", "ll", "re", "ve", "m", "d", "yes", "yeah", "ok", "okay",
];

const STOP_WORDS_FR: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "c", "ça", "cette", "dans", "de", "des", "du", "elle",
    "elles", "en", "et", "eux", "il", "ils", "je", "j", "la", "le", "les", "leur", "leurs", "lui",
    "l", "ma", "mais", "me", "même", "mes", "moi", "mon", "n", "ne", "nos", "notre", "nous",
    "on", "ou", "où", "par", "pas", "pour", "qu", "que", "qui", "quoi", "sa", "se", "ses", "si",
    "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une", "vos", "votre", "vous",
    "y", "à", "été", "être", "est", "es", "suis", "sommes", "êtes", "sont", "ai", "as", "avons",
    "avez", "ont", "avait", "était", "fait", "faire", "plus", "très", "aussi", "bien", "oui",
    "non", "alors", "donc", "car", "comme", "tout", "tous", "toute", "toutes", "d", "s", "m",
    "t", "va", "vais", "ici", "là",
];

/// Picks the most frequent content words of a text batch
#[derive(Debug, Clone)]
pub struct TopicExtractor {
    stop_words: HashSet<&'static str>,
}

impl Default for TopicExtractor {
    fn default() -> Self {
        Self {
            stop_words: STOP_WORDS_EN
                .iter()
                .chain(STOP_WORDS_FR)
                .copied()
                .collect(),
        }
    }
}

impl TopicExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top `n` topics across `texts`, most frequent first; ties keep first occurrence order
    pub fn extract<'a>(&self, texts: impl IntoIterator<Item = &'a str>, n: usize) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut position = 0;

        for text in texts {
            for word in words(text) {
                let word = word.to_lowercase();
                if self.stop_words.contains(word.as_str()) {
                    continue;
                }
                let entry = counts.entry(word).or_insert((0, position));
                entry.0 += 1;
                position += 1;
            }
        }

        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|(_, (a_count, a_first)), (_, (b_count, b_first))| {
            b_count.cmp(a_count).then(a_first.cmp(b_first))
        });
        ranked.into_iter().take(n).map(|(word, _)| word).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_frequent_first() {
        let topics = TopicExtractor::new().extract(
            [
                "I love Rust and rust loves me",
                "Rust compiles, tokio runs",
                "tokio is async",
            ],
            2,
        );
        assert_eq!(topics, vec!["rust", "tokio"]);
    }

    #[test]
    fn test_ties_keep_first_occurrence() {
        let topics = TopicExtractor::new().extract(["pizza cinema pizza cinema football"], 3);
        assert_eq!(topics, vec!["pizza", "cinema", "football"]);
    }

    #[test]
    fn test_french_stop_words_removed() {
        let topics = TopicExtractor::new().extract(["Je pense que le vélo est génial"], 5);
        assert_eq!(topics, vec!["pense", "vélo", "génial"]);
    }

    #[test]
    fn test_empty_input() {
        let topics = TopicExtractor::new().extract(std::iter::empty(), 3);
        assert!(topics.is_empty());
    }
}
