//! Optional classifier-backed generator.
//!
//! The artifact is a JSON export of a TF-IDF vectorizer plus a one-vs-rest
//! logistic regression:
//!
//! ```json
//! {
//!   "vocabulary": {"python": 0, "react": 1},
//!   "idf": [1.2, 1.7],
//!   "classes": ["Python", "React"],
//!   "coef": [[3.1, -0.2], [-0.4, 2.9]],
//!   "intercept": [-1.0, -1.1],
//!   "categories": {"Python": "programming"}
//! }
//! ```
//!
//! Without an artifact the generator yields nothing.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::skills::{SkillCandidate, SkillGenerator, SourceStrategy};

static RE_NON_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s+#]").unwrap());

/// Classes at or below this probability are not emitted.
const EMIT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read skill model {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid skill model JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Skill model is inconsistent: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    classes: Vec<String>,
    coef: Vec<Vec<f32>>,
    intercept: Vec<f32>,
    #[serde(default)]
    categories: HashMap<String, String>,
}

impl SkillModel {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: SkillModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let features = self.idf.len();
        if let Some((term, index)) = self.vocabulary.iter().find(|(_, i)| **i >= features) {
            return Err(ModelError::Shape(format!(
                "term {term:?} maps to feature {index} but idf has {features} entries"
            )));
        }
        if self.coef.len() != self.classes.len() || self.intercept.len() != self.classes.len() {
            return Err(ModelError::Shape(format!(
                "{} classes, {} coefficient rows, {} intercepts",
                self.classes.len(),
                self.coef.len(),
                self.intercept.len()
            )));
        }
        if let Some(row) = self.coef.iter().position(|r| r.len() != features) {
            return Err(ModelError::Shape(format!(
                "coefficient row {row} does not have {features} features"
            )));
        }
        Ok(())
    }

    /// L2-normalised TF-IDF vector as sparse (feature, weight) pairs.
    fn vectorize(&self, text: &str) -> Vec<(usize, f32)> {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for token in text.split_whitespace() {
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_default() += 1.0;
            }
        }

        let mut weights: Vec<(usize, f32)> = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut weights {
                *w /= norm;
            }
        }
        weights
    }

    /// Per-class probability, in class order.
    pub fn predict(&self, text: &str) -> Vec<f32> {
        let features = self.vectorize(&preprocess(text));
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| {
                let z = bias + features.iter().map(|&(i, w)| row[i] * w).sum::<f32>();
                1.0 / (1.0 + (-z).exp())
            })
            .collect()
    }
}

/// Lower-cases, replaces everything except alphanumerics, whitespace, `+`
/// and `#` with a space, then collapses whitespace.
pub fn preprocess(text: &str) -> String {
    let lower = text.to_lowercase();
    let cleaned = RE_NON_TOKEN.replace_all(&lower, " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct ModelBasedGenerator {
    model: Option<SkillModel>,
}

impl ModelBasedGenerator {
    pub fn new(model: SkillModel) -> Self {
        info!(classes = model.classes.len(), "Skill classifier loaded");
        Self { model: Some(model) }
    }

    pub fn unavailable() -> Self {
        Self { model: None }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }
}

impl SkillGenerator for ModelBasedGenerator {
    fn source(&self) -> SourceStrategy {
        SourceStrategy::Model
    }

    fn generate(&self, text: &str) -> Vec<SkillCandidate> {
        let Some(model) = &self.model else {
            return Vec::new();
        };

        model
            .predict(text)
            .into_iter()
            .zip(&model.classes)
            .filter(|(p, _)| *p > EMIT_THRESHOLD)
            .map(|(p, class)| SkillCandidate {
                category: model.categories.get(class).cloned(),
                probability: Some(p),
                ..SkillCandidate::new(class.clone(), SourceStrategy::Model)
            })
            .collect()
    }
}
