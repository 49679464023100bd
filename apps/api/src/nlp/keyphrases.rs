use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const TOP_BIGRAMS: usize = 10;
const TOP_TRIGRAMS: usize = 5;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "etc",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most",
    "my", "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "out", "over", "own", "per", "same", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "us", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

/// Lower-cased alphabetic tokens with stopwords removed, in text order.
fn content_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty() && w.chars().all(char::is_alphabetic))
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Most frequent n-grams; ties keep first-occurrence order.
fn top_ngrams(words: &[String], n: usize, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (index, window) in words.windows(n).enumerate() {
        counts
            .entry(window.join(" "))
            .or_insert((0, index))
            .0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(limit).map(|(phrase, _)| phrase).collect()
}

/// Top bigrams then top trigrams, without duplicates.
pub fn extract_key_phrases(text: &str) -> Vec<String> {
    let words = content_words(text);
    let mut phrases = top_ngrams(&words, 2, TOP_BIGRAMS);
    for trigram in top_ngrams(&words, 3, TOP_TRIGRAMS) {
        if !phrases.contains(&trigram) {
            phrases.push(trigram);
        }
    }
    phrases
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStatistics {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_word_length: f64,
}

pub fn text_statistics(text: &str) -> TextStatistics {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();

    let sentence_count = text
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count();

    let avg_word_length = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64
    };

    TextStatistics {
        word_count: words.len(),
        sentence_count,
        avg_word_length,
    }
}
