//! Lexicon sentiment scorer.
//!
//! Each lexicon hit contributes (polarity, subjectivity). An intensifier
//! directly before a hit scales both; a negation directly before it flips
//! and halves the polarity. The document score is the mean over hits.

use serde::{Deserialize, Serialize};

/// (word, polarity, subjectivity)
const LEXICON: &[(&str, f64, f64)] = &[
    ("accomplished", 0.6, 0.8),
    ("achieved", 0.4, 0.5),
    ("award", 0.4, 0.5),
    ("awarded", 0.5, 0.5),
    ("best", 1.0, 0.3),
    ("brilliant", 0.9, 1.0),
    ("capable", 0.3, 0.5),
    ("creative", 0.5, 0.75),
    ("dedicated", 0.4, 0.6),
    ("effective", 0.6, 0.8),
    ("efficient", 0.5, 0.6),
    ("enthusiastic", 0.6, 0.8),
    ("excellent", 1.0, 1.0),
    ("exceptional", 0.67, 1.0),
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("happy", 0.8, 1.0),
    ("innovative", 0.5, 0.75),
    ("outstanding", 0.5, 0.8),
    ("passionate", 0.5, 0.9),
    ("positive", 0.23, 0.55),
    ("proud", 0.8, 1.0),
    ("reliable", 0.4, 0.5),
    ("strong", 0.43, 0.73),
    ("successful", 0.75, 0.95),
    ("successfully", 0.75, 0.95),
    ("talented", 0.7, 0.9),
    ("bad", -0.7, 0.67),
    ("difficult", -0.5, 1.0),
    ("disappointing", -0.6, 0.7),
    ("failed", -0.5, 0.3),
    ("failure", -0.32, 0.3),
    ("lack", -0.3, 0.4),
    ("limited", -0.07, 0.14),
    ("negative", -0.3, 0.4),
    ("poor", -0.4, 0.6),
    ("problematic", -0.5, 0.6),
    ("terrible", -1.0, 1.0),
    ("weak", -0.38, 0.63),
    ("worst", -1.0, 1.0),
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("extremely", 1.5),
    ("highly", 1.4),
    ("really", 1.2),
    ("exceptionally", 1.5),
    ("quite", 1.1),
];

const NEGATIONS: &[&str] = &["not", "never", "no", "without", "hardly"];
const NEGATION_FACTOR: f64 = -0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
}

impl Tone {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.5 {
            Tone::VeryPositive
        } else if polarity > 0.1 {
            Tone::Positive
        } else if polarity < -0.5 {
            Tone::VeryNegative
        } else if polarity < -0.1 {
            Tone::Negative
        } else {
            Tone::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub polarity: f64,
    pub subjectivity: f64,
    pub tone: Tone,
}

fn lookup(word: &str) -> Option<(f64, f64)> {
    LEXICON
        .iter()
        .find(|(w, _, _)| *w == word)
        .map(|&(_, p, s)| (p, s))
}

fn intensity(word: &str) -> Option<f64> {
    INTENSIFIERS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|&(_, f)| f)
}

pub fn analyze_sentiment(text: &str) -> Sentiment {
    let mut hits: Vec<(f64, f64)> = Vec::new();
    let mut negated = false;
    let mut factor = 1.0;

    let words = text
        .split(|c: char| !c.is_alphabetic() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase);

    for word in words {
        if NEGATIONS.contains(&word.as_str()) || word.ends_with("n't") {
            negated = true;
            continue;
        }
        if let Some(f) = intensity(&word) {
            factor *= f;
            continue;
        }
        if let Some((polarity, subjectivity)) = lookup(&word) {
            let mut p = (polarity * factor).clamp(-1.0, 1.0);
            if negated {
                p *= NEGATION_FACTOR;
            }
            hits.push((p, (subjectivity * factor).min(1.0)));
        }
        negated = false;
        factor = 1.0;
    }

    let (polarity, subjectivity) = if hits.is_empty() {
        (0.0, 0.0)
    } else {
        let n = hits.len() as f64;
        (
            (hits.iter().map(|h| h.0).sum::<f64>() / n).clamp(-1.0, 1.0),
            (hits.iter().map(|h| h.1).sum::<f64>() / n).clamp(0.0, 1.0),
        )
    };

    Sentiment {
        polarity,
        subjectivity,
        tone: Tone::from_polarity(polarity),
    }
}
