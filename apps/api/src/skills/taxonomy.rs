use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Failed to read skill taxonomy {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid skill taxonomy JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Skill taxonomy entry {0:?} has an empty name")]
    EmptyName(usize),
}

/// One canonical skill with its match aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub category: String,
    #[serde(default = "default_importance")]
    pub importance: u32,
}

fn default_importance() -> u32 {
    5
}

/// Scoring weights for the merge step. Defaults reproduce the original
/// empirical constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub base_confidence: u32,
    pub frequency_step: u32,
    pub frequency_cap: u32,
    pub per_source_bonus: u32,
    pub proficiency_bonus: u32,
    pub section_bonus: u32,
    pub max_confidence: u32,
    /// Names more similar than this (0-100) collapse into one skill.
    pub similarity_threshold: f64,
    pub technical_categories: Vec<String>,
    pub technical_multiplier: f64,
    pub importance_weight: f64,
    pub proficiency_terms: Vec<String>,
    /// Words allowed between a proficiency term and the skill ("expert in React").
    pub proficiency_connectives: Vec<String>,
    /// Sort candidates by (source, lower-cased name) before clustering so the
    /// result no longer depends on arrival order. Off by default.
    pub sort_candidates: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            base_confidence: 60,
            frequency_step: 5,
            frequency_cap: 20,
            per_source_bonus: 10,
            proficiency_bonus: 15,
            section_bonus: 10,
            max_confidence: 95,
            similarity_threshold: 85.0,
            technical_categories: strings(&["programming", "web", "data", "ai"]),
            technical_multiplier: 1.2,
            importance_weight: 5.0,
            proficiency_terms: strings(&["expert", "advanced", "proficient", "experienced", "skilled"]),
            proficiency_connectives: strings(&["in", "with", "at", "of"]),
            sort_candidates: false,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Immutable skill lexicon plus merge weights, built once at startup and
/// shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTaxonomy {
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl SkillTaxonomy {
    pub fn from_json(json: &str) -> Result<Self, TaxonomyError> {
        let taxonomy: SkillTaxonomy = serde_json::from_str(json)?;
        if let Some(index) = taxonomy.skills.iter().position(|e| e.name.trim().is_empty()) {
            return Err(TaxonomyError::EmptyName(index));
        }
        Ok(taxonomy)
    }

    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let json = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Entry whose canonical name is exactly `name`.
    pub fn canonical(&self, name: &str) -> Option<&SkillEntry> {
        self.skills.iter().find(|e| e.name == name)
    }

    /// Category of the entry whose canonical name or an alias equals `name`,
    /// ignoring case.
    pub fn category_for(&self, name: &str) -> Option<&str> {
        let lower = name.trim().to_lowercase();
        self.skills
            .iter()
            .find(|e| {
                e.name.to_lowercase() == lower || e.aliases.iter().any(|a| a.to_lowercase() == lower)
            })
            .map(|e| e.category.as_str())
    }

    pub fn is_technical(&self, category: &str) -> bool {
        self.merge
            .technical_categories
            .iter()
            .any(|c| c == category)
    }
}

fn entry(name: &str, aliases: &[&str], category: &str, importance: u32) -> SkillEntry {
    SkillEntry {
        name: name.to_string(),
        aliases: strings(aliases),
        category: category.to_string(),
        importance,
    }
}

impl Default for SkillTaxonomy {
    /// Built-in lexicon used when `SKILL_TAXONOMY_PATH` is not set.
    fn default() -> Self {
        let skills = vec![
            // programming
            entry("Python", &["python3", "py"], "programming", 10),
            entry("JavaScript", &["js", "es6"], "programming", 9),
            entry("Java", &[], "programming", 8),
            entry("TypeScript", &["ts"], "programming", 8),
            entry("C++", &["cpp"], "programming", 7),
            entry("Ruby", &[], "programming", 6),
            entry("Rust", &[], "programming", 7),
            entry("Golang", &[], "programming", 7),
            // web
            entry("React", &["react.js", "reactjs"], "web", 8),
            entry("Angular", &["angularjs"], "web", 7),
            entry("Vue", &["vue.js", "vuejs"], "web", 7),
            entry("Django", &[], "web", 7),
            entry("Flask", &[], "web", 6),
            entry("Node.js", &["nodejs"], "web", 7),
            // data
            entry("Pandas", &[], "data", 6),
            entry("NumPy", &[], "data", 6),
            entry("Scikit-learn", &["sklearn"], "data", 7),
            entry("TensorFlow", &[], "data", 8),
            entry("PyTorch", &[], "data", 8),
            entry("Spark", &["apache spark", "pyspark"], "data", 7),
            // ai
            entry("Machine Learning", &["ml", "machine-learning"], "ai", 9),
            entry("Deep Learning", &["deep-learning"], "ai", 8),
            // cloud / devops
            entry("Docker", &["containerization"], "devops", 7),
            entry("Kubernetes", &["k8s"], "cloud", 7),
            entry("Terraform", &[], "cloud", 6),
            entry("Azure", &[], "cloud", 6),
            entry("GCP", &["google cloud"], "cloud", 6),
            // database
            entry("PostgreSQL", &["postgres"], "database", 7),
            entry("MySQL", &[], "database", 6),
            entry("MongoDB", &[], "database", 6),
            entry("Redis", &[], "database", 6),
            entry("Elasticsearch", &[], "database", 6),
            // soft skills
            entry("Leadership", &["team lead", "management"], "soft_skills", 8),
            entry("Communication", &["interpersonal"], "soft_skills", 9),
            entry("Teamwork", &["collaboration"], "soft_skills", 7),
            entry("Problem Solving", &["problem-solving"], "soft_skills", 7),
            // certifications
            entry("AWS Certified", &["aws certification"], "certification", 8),
            entry("PMP", &["project management professional"], "certification", 7),
        ];

        Self {
            skills,
            merge: MergeConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lookup() {
        let taxonomy = SkillTaxonomy::default();
        assert_eq!(taxonomy.category_for("python"), Some("programming"));
        assert_eq!(taxonomy.category_for("ReactJS"), Some("web"));
        assert_eq!(taxonomy.category_for("Haskell"), None);
        assert!(taxonomy.canonical("Python").is_some());
        assert!(taxonomy.canonical("python").is_none());
        assert!(taxonomy.is_technical("ai"));
        assert!(!taxonomy.is_technical("cloud"));
    }

    #[test]
    fn test_from_json_with_partial_merge_overrides() {
        let json = r#"{
            "skills": [
                {"name": "Elixir", "aliases": ["ex"], "category": "programming", "importance": 6},
                {"name": "Figma", "category": "design"}
            ],
            "merge": {"base_confidence": 50, "sort_candidates": true}
        }"#;
        let taxonomy = SkillTaxonomy::from_json(json).unwrap();
        assert_eq!(taxonomy.skills.len(), 2);
        assert_eq!(taxonomy.skills[1].importance, 5);
        assert!(taxonomy.skills[1].aliases.is_empty());
        assert_eq!(taxonomy.merge.base_confidence, 50);
        assert!(taxonomy.merge.sort_candidates);
        assert_eq!(taxonomy.merge.max_confidence, 95);
    }

    #[test]
    fn test_from_json_rejects_empty_name() {
        let json = r#"{"skills": [{"name": " ", "category": "x"}]}"#;
        assert!(matches!(
            SkillTaxonomy::from_json(json),
            Err(TaxonomyError::EmptyName(0))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SkillTaxonomy::load(Path::new("/nonexistent/taxonomy.json")).unwrap_err();
        assert!(matches!(err, TaxonomyError::Read { .. }));
    }
}
