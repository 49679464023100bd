use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};

pub fn ner_system() -> String {
    format!(
        "{JSON_ONLY_SYSTEM} You are a named-entity recognizer for CVs and resumes. \
         {GROUNDING_INSTRUCTION}"
    )
}

pub fn ner_prompt(text: &str) -> String {
    format!(
        r#"Extract the named entities from the CV below.

Use exactly these entity types:
- PER: people
- ORG: companies, universities, institutions
- LOC: cities, countries, regions
- MISC: other proper names (products, events, nationalities)

Return JSON of the form:
{{"entities": [{{"type": "ORG", "text": "Acme Corp"}}]}}

List entities in the order they appear. Return {{"entities": []}} if there are none.

CV:
"""
{text}
""""#
    )
}

pub const SUMMARY_SYSTEM: &str = "You summarize CVs for academic advisors. \
    Write plain prose in the third person. No headings, lists, or preamble.";

pub fn summary_prompt(text: &str, min_words: u32, max_words: u32) -> String {
    format!(
        "Summarize the following CV excerpt in {min_words} to {max_words} words. \
         {GROUNDING_INSTRUCTION}\n\n{text}"
    )
}
