//! Skill Merger & Confidence Scorer.
//!
//! Pure function of (candidates, text, sections, taxonomy). Clustering is
//! greedy in arrival order: a candidate joins the first accepted skill whose
//! lower-cased name is more similar than the threshold, so the first-seen
//! spelling and category win. With `MergeConfig::sort_candidates` the input
//! is first put in a canonical order, making the result order-independent.

use std::collections::{BTreeMap, BTreeSet};

use crate::sections::inline_body;
use crate::skills::taxonomy::{MergeConfig, SkillTaxonomy};
use crate::skills::{Skill, SkillCandidate, SourceStrategy};

/// Fallback category for names the taxonomy does not know.
pub const GENERAL_CATEGORY: &str = "general";

struct Cluster {
    key: String,
    name: String,
    category: Option<String>,
    sources: BTreeSet<SourceStrategy>,
}

/// Edit similarity on a 0-100 scale.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

pub fn merge_candidates(
    candidates: &[SkillCandidate],
    text: &str,
    sections: &BTreeMap<String, String>,
    taxonomy: &SkillTaxonomy,
) -> Vec<Skill> {
    let config = &taxonomy.merge;

    let mut ordered: Vec<&SkillCandidate> = candidates.iter().collect();
    if config.sort_candidates {
        ordered.sort_by_cached_key(|c| (c.source, c.name.to_lowercase()));
    }

    let clusters = cluster(&ordered, config.similarity_threshold);

    let text_lower = text.to_lowercase();
    // inline "Skills: a, b" lines never reach a section body
    let skill_sections: Vec<String> = sections
        .iter()
        .filter(|(key, _)| key.contains("skills"))
        .map(|(_, body)| body.to_lowercase())
        .chain(
            text.lines()
                .filter_map(inline_body)
                .filter(|(key, _)| key.contains("skills"))
                .map(|(_, body)| body.to_lowercase()),
        )
        .collect();

    let mut skills: Vec<Skill> = clusters
        .into_iter()
        .map(|cluster| {
            let confidence = confidence(&cluster, &text_lower, &skill_sections, config);
            let category = cluster
                .category
                .or_else(|| taxonomy.category_for(&cluster.name).map(str::to_string))
                .unwrap_or_else(|| GENERAL_CATEGORY.to_string());

            let mut importance = f64::from(confidence);
            if taxonomy.is_technical(&category) {
                importance *= config.technical_multiplier;
            }
            if let Some(entry) = taxonomy.canonical(&cluster.name) {
                importance += f64::from(entry.importance) * config.importance_weight;
            }

            Skill {
                name: cluster.name,
                category,
                confidence,
                importance,
                sources: cluster.sources,
            }
        })
        .collect();

    // sort_by is stable: equal importance keeps cluster order
    skills.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    skills
}

fn cluster(candidates: &[&SkillCandidate], threshold: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for candidate in candidates {
        let key = candidate.name.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }

        match clusters
            .iter_mut()
            .find(|c| similarity(&key, &c.key) > threshold)
        {
            Some(existing) => {
                existing.sources.insert(candidate.source);
            }
            None => clusters.push(Cluster {
                key,
                name: candidate.name.trim().to_string(),
                category: candidate.category.clone(),
                sources: BTreeSet::from([candidate.source]),
            }),
        }
    }

    clusters
}

fn confidence(
    cluster: &Cluster,
    text_lower: &str,
    skill_sections: &[String],
    config: &MergeConfig,
) -> u32 {
    let name = cluster.key.as_str();
    let mut score = config.base_confidence;

    let occurrences = text_lower.matches(name).count() as u32;
    score += occurrences
        .saturating_mul(config.frequency_step)
        .min(config.frequency_cap);

    score += config.per_source_bonus * cluster.sources.len() as u32;

    if has_proficiency_qualifier(text_lower, name, config) {
        score += config.proficiency_bonus;
    }

    if skill_sections.iter().any(|body| body.contains(name)) {
        score += config.section_bonus;
    }

    score.min(config.max_confidence)
}

/// True when a proficiency term sits right before or after `name`, allowing
/// one connective word in the "term before name" direction.
fn has_proficiency_qualifier(text_lower: &str, name: &str, config: &MergeConfig) -> bool {
    config.proficiency_terms.iter().any(|term| {
        text_lower.contains(&format!("{term} {name}"))
            || text_lower.contains(&format!("{name} {term}"))
            || config
                .proficiency_connectives
                .iter()
                .any(|conn| text_lower.contains(&format!("{term} {conn} {name}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, category: &str) -> SkillCandidate {
        SkillCandidate {
            category: Some(category.to_string()),
            ..SkillCandidate::new(name, SourceStrategy::Rule)
        }
    }

    fn pattern(name: &str) -> SkillCandidate {
        SkillCandidate::new(name, SourceStrategy::Pattern)
    }

    fn merge(candidates: &[SkillCandidate], text: &str) -> Vec<Skill> {
        let sections = crate::sections::segment_sections(text);
        merge_candidates(candidates, text, &sections, &SkillTaxonomy::default())
    }

    #[test]
    fn test_worked_example_scores() {
        let text = "Experienced Python developer, expert in React, AWS Certified.";
        let candidates = vec![
            rule("Python", "programming"),
            rule("React", "web"),
            rule("AWS Certified", "certification"),
        ];
        let skills = merge(&candidates, text);

        assert_eq!(skills.len(), 3);
        assert_eq!(skills[0].name, "Python");
        assert_eq!(skills[0].confidence, 90);
        assert!((skills[0].importance - 158.0).abs() < 1e-9);
        assert_eq!(skills[1].name, "React");
        assert_eq!(skills[1].confidence, 90);
        assert!((skills[1].importance - 148.0).abs() < 1e-9);
        assert_eq!(skills[2].name, "AWS Certified");
        assert_eq!(skills[2].confidence, 75);
        assert!((skills[2].importance - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_duplicates_merge_with_source_union() {
        let candidates = vec![rule("Python", "programming"), pattern("python3")];
        let skills = merge(&candidates, "python3 all day");

        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "Python");
        assert_eq!(skills[0].category, "programming");
        assert_eq!(
            skills[0].sources,
            BTreeSet::from([SourceStrategy::Rule, SourceStrategy::Pattern])
        );
    }

    #[test]
    fn test_confidence_is_clamped() {
        let text = "expert rust. rust rust rust rust rust";
        let candidates = vec![rule("Rust", "programming"), pattern("Rust")];
        let skills = merge(&candidates, text);
        assert_eq!(skills[0].confidence, 95);
    }

    #[test]
    fn test_skills_section_bonus() {
        let skills = merge(&[pattern("Haskell")], "Skills\nRust, Haskell\n");
        assert_eq!(skills[0].confidence, 85);
        assert_eq!(skills[0].category, GENERAL_CATEGORY);
    }

    #[test]
    fn test_inline_skills_line_earns_section_bonus() {
        let inline = merge(&[pattern("Haskell")], "SKILLS: Haskell, Docker");
        let block = merge(&[pattern("Haskell")], "SKILLS\nHaskell, Docker");
        assert_eq!(inline[0].confidence, 85);
        assert_eq!(inline[0].confidence, block[0].confidence);

        let skills = merge(&[pattern("Leadership")], "SKILLS: Python, Docker; Leadership");
        assert_eq!(skills[0].confidence, 85);
    }

    #[test]
    fn test_uncategorized_candidate_takes_taxonomy_category() {
        let skills = merge(&[pattern("docker")], "docker");
        assert_eq!(skills[0].category, "devops");
        // not the canonical spelling, so no importance boost
        assert!((skills[0].importance - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let candidates = vec![pattern("Kafka"), pattern("Figma"), pattern("Jira")];
        let skills = merge(&candidates, "Kafka Figma Jira");
        let names: Vec<&str> = skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Kafka", "Figma", "Jira"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let text = "SKILLS: Python, Docker; Leadership\nExperienced Python developer";
        let candidates = vec![
            rule("Python", "programming"),
            rule("Docker", "devops"),
            pattern("Python"),
            pattern("Docker"),
            pattern("Leadership"),
        ];
        assert_eq!(merge(&candidates, text), merge(&candidates, text));
    }

    #[test]
    fn test_invariants_hold() {
        let text = "Skills: React, ReactJS, React.js, Reactive, Rust, Ruby, Rusty";
        let candidates: Vec<SkillCandidate> = ["React", "ReactJS", "React.js", "Reactive", "Rust", "Ruby", "Rusty"]
            .iter()
            .map(|n| pattern(n))
            .collect();
        let skills = merge(&candidates, text);

        for skill in &skills {
            assert!(skill.confidence <= 95);
        }
        for (i, a) in skills.iter().enumerate() {
            for b in &skills[i + 1..] {
                let s = similarity(&a.name.to_lowercase(), &b.name.to_lowercase());
                assert!(s <= 85.0, "{} ~ {} = {s}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_canonical_sort_makes_order_irrelevant() {
        let mut taxonomy = SkillTaxonomy::default();
        taxonomy.merge.sort_candidates = true;
        let sections = BTreeMap::new();
        let text = "reactjs and react";

        let forward = vec![pattern("ReactJS"), rule("React", "web")];
        let backward = vec![rule("React", "web"), pattern("ReactJS")];

        let a = merge_candidates(&forward, text, &sections, &taxonomy);
        let b = merge_candidates(&backward, text, &sections, &taxonomy);
        assert_eq!(a, b);
        assert_eq!(a[0].name, "React");
    }
}
