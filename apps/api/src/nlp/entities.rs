use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm_client::LlmClient;
use crate::nlp::prompts::{ner_prompt, ner_system};
use crate::nlp::NlpError;

/// Entity text grouped by type label (`PER`, `ORG`, `LOC`, `MISC`).
pub type EntityGroups = BTreeMap<String, Vec<String>>;

/// Input cap for the model call.
const MAX_NER_CHARS: usize = 8_000;

/// Capability boundary for named-entity recognition.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>, NlpError>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecognizedEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub text: String,
}

/// Groups entities by type, keeping first-appearance order and dropping
/// repeats within a group. Types with no entities are absent.
pub fn group_entities(entities: Vec<RecognizedEntity>) -> EntityGroups {
    let mut groups = EntityGroups::new();
    for entity in entities {
        let label = entity.entity_type.trim().to_uppercase();
        let text = entity.text.trim().to_string();
        if label.is_empty() || text.is_empty() {
            continue;
        }
        let group = groups.entry(label).or_default();
        if !group.contains(&text) {
            group.push(text);
        }
    }
    groups
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    #[serde(default)]
    entities: Vec<RecognizedEntity>,
}

pub struct LlmEntityRecognizer {
    llm: LlmClient,
}

impl LlmEntityRecognizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl EntityRecognizer for LlmEntityRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>, NlpError> {
        let excerpt: String = text.chars().take(MAX_NER_CHARS).collect();
        let response: NerResponse = self
            .llm
            .complete_json(&ner_prompt(&excerpt), &ner_system())
            .await?;
        Ok(response.entities)
    }
}

/// Used when no model backend is configured.
pub struct UnavailableRecognizer;

#[async_trait]
impl EntityRecognizer for UnavailableRecognizer {
    async fn recognize(&self, _text: &str) -> Result<Vec<RecognizedEntity>, NlpError> {
        Err(NlpError::Unavailable("entity recognition"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(entity_type: &str, text: &str) -> RecognizedEntity {
        RecognizedEntity {
            entity_type: entity_type.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_group_entities() {
        let groups = group_entities(vec![
            entity("PER", "Jane Doe"),
            entity("org", "Acme Corp"),
            entity("ORG", "MIT"),
            entity("ORG", "Acme Corp"),
            entity("LOC", "  "),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["PER"], vec!["Jane Doe"]);
        assert_eq!(groups["ORG"], vec!["Acme Corp", "MIT"]);
        assert!(!groups.contains_key("LOC"));
    }

    #[test]
    fn test_ner_response_parses() {
        let json = r#"{"entities": [{"type": "LOC", "text": "Berlin"}]}"#;
        let response: NerResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.entities, vec![entity("LOC", "Berlin")]);

        let empty: NerResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.entities.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_recognizer() {
        let result = UnavailableRecognizer.recognize("Jane").await;
        assert!(matches!(result, Err(NlpError::Unavailable(_))));
    }
}
