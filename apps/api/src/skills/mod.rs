//! Skill extraction: three independent candidate generators feeding one
//! pure merge step.
//!
//! Generators implement [`SkillGenerator`] and hold only read-only state
//! (the shared [`taxonomy::SkillTaxonomy`] or a loaded model), so the
//! pipeline can run them in parallel on the blocking pool.

pub mod merge;
pub mod model_based;
pub mod pattern_based;
pub mod rule_based;
pub mod taxonomy;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use merge::merge_candidates;
pub use model_based::ModelBasedGenerator;
pub use pattern_based::PatternBasedGenerator;
pub use rule_based::RuleBasedGenerator;
pub use taxonomy::SkillTaxonomy;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Which generator proposed a candidate. Ordered so provenance sets
/// serialize as `rule`, `model`, `pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStrategy {
    Rule,
    Model,
    Pattern,
}

/// One proposed skill from one generator. Lives only for a single merge pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillCandidate {
    pub name: String,
    pub category: Option<String>,
    pub source: SourceStrategy,
    /// Literal string that matched (rule-based only).
    pub matched: Option<String>,
    /// First 100 chars of the surrounding block (pattern-based only).
    pub context: Option<String>,
    /// Classifier probability (model-based only).
    pub probability: Option<f32>,
}

impl SkillCandidate {
    pub fn new(name: impl Into<String>, source: SourceStrategy) -> Self {
        Self {
            name: name.into(),
            category: None,
            source,
            matched: None,
            context: None,
            probability: None,
        }
    }
}

/// A merged, scored skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub category: String,
    /// 0 to `MergeConfig::max_confidence` (95 by default).
    pub confidence: u32,
    /// Ranking key only; unbounded.
    pub importance: f64,
    pub sources: BTreeSet<SourceStrategy>,
}

// ────────────────────────────────────────────────────────────────────────────
// Generator trait
// ────────────────────────────────────────────────────────────────────────────

/// A skill candidate generator. Must be pure with respect to shared state.
pub trait SkillGenerator: Send + Sync {
    fn source(&self) -> SourceStrategy;

    fn generate(&self, text: &str) -> Vec<SkillCandidate>;
}
