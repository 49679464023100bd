use std::sync::LazyLock;

use regex::Regex;

use crate::skills::{SkillCandidate, SkillGenerator, SourceStrategy};

/// A label followed by one or more non-blank lines.
static RE_SKILL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:skills|expertise|competencies|technologies)[:\s]*([^\n]+(?:\n[^\n]+)*)")
        .unwrap()
});

const DELIMITERS: [char; 6] = [',', ';', '|', '•', '·', '\n'];
const MIN_TOKEN_CHARS: usize = 3;
const MAX_TOKEN_CHARS: usize = 49;
const CONTEXT_CHARS: usize = 100;

/// Scrapes delimiter-separated lists that follow skill-like labels.
#[derive(Debug, Default)]
pub struct PatternBasedGenerator;

impl PatternBasedGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SkillGenerator for PatternBasedGenerator {
    fn source(&self) -> SourceStrategy {
        SourceStrategy::Pattern
    }

    fn generate(&self, text: &str) -> Vec<SkillCandidate> {
        let mut candidates = Vec::new();

        for caps in RE_SKILL_BLOCK.captures_iter(text) {
            let (Some(whole), Some(block)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let context: String = whole.as_str().chars().take(CONTEXT_CHARS).collect();

            for token in block.as_str().split(DELIMITERS) {
                let token = token.trim();
                let len = token.chars().count();
                // longer items are prose, not skill names
                if (MIN_TOKEN_CHARS..=MAX_TOKEN_CHARS).contains(&len) {
                    candidates.push(SkillCandidate {
                        context: Some(context.clone()),
                        ..SkillCandidate::new(token, SourceStrategy::Pattern)
                    });
                }
            }
        }

        candidates
    }
}
