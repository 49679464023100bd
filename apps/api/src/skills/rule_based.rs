use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::skills::taxonomy::SkillTaxonomy;
use crate::skills::{SkillCandidate, SkillGenerator, SourceStrategy};

struct CompiledEntry {
    name: String,
    category: String,
    /// Canonical name first, then aliases in declaration order.
    terms: Vec<(String, Regex)>,
}

/// Lexicon matcher over the skill taxonomy. Patterns are compiled once.
pub struct RuleBasedGenerator {
    entries: Vec<CompiledEntry>,
}

/// Case-insensitive whole-word pattern. Boundaries are "non-word char or
/// edge" rather than `\b`, so terms like `C++` and `Node.js` still match.
fn whole_word(term: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(term)))
}

impl RuleBasedGenerator {
    pub fn new(taxonomy: Arc<SkillTaxonomy>) -> Self {
        let entries = taxonomy
            .skills
            .iter()
            .map(|entry| {
                let terms = std::iter::once(&entry.name)
                    .chain(entry.aliases.iter())
                    .filter_map(|term| match whole_word(term) {
                        Ok(re) => Some((term.clone(), re)),
                        Err(e) => {
                            warn!(term = %term, error = %e, "Skipping unmatchable taxonomy term");
                            None
                        }
                    })
                    .collect();
                CompiledEntry {
                    name: entry.name.clone(),
                    category: entry.category.clone(),
                    terms,
                }
            })
            .collect();

        Self { entries }
    }
}

impl SkillGenerator for RuleBasedGenerator {
    fn source(&self) -> SourceStrategy {
        SourceStrategy::Rule
    }

    fn generate(&self, text: &str) -> Vec<SkillCandidate> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let (term, _) = entry.terms.iter().find(|(_, re)| re.is_match(text))?;
                Some(SkillCandidate {
                    category: Some(entry.category.clone()),
                    matched: Some(term.clone()),
                    ..SkillCandidate::new(entry.name.clone(), SourceStrategy::Rule)
                })
            })
            .collect()
    }
}
