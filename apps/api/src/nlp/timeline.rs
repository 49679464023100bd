use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static RE_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]* \d{4}\b").unwrap()
});
static RE_NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap());

/// Characters of context kept on each side of a date mention.
const CONTEXT_RADIUS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    /// Character (not byte) offset of the match.
    pub position: usize,
    pub context: String,
}

/// Every match of each date pattern, ordered by position. A `May 2020`
/// mention also yields its `2020` year match.
pub fn extract_timeline(text: &str) -> Vec<TimelineEntry> {
    // byte offset of every char, plus the end
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_offset = |byte: usize| boundaries.partition_point(|&b| b < byte);
    let total_chars = boundaries.len() - 1;

    let mut timeline = Vec::new();
    for pattern in [&*RE_YEAR, &*RE_MONTH_YEAR, &*RE_NUMERIC_DATE] {
        for m in pattern.find_iter(text) {
            let start = char_offset(m.start());
            let end = char_offset(m.end());
            let from = boundaries[start.saturating_sub(CONTEXT_RADIUS)];
            let to = boundaries[(end + CONTEXT_RADIUS).min(total_chars)];
            timeline.push(TimelineEntry {
                date: m.as_str().to_string(),
                position: start,
                context: text[from..to].to_string(),
            });
        }
    }

    timeline.sort_by_key(|entry| entry.position);
    timeline
}
