//! Entity & Timeline Extractor.
//!
//! Runs independently of the skill pipeline. The regex and lexicon passes
//! are local and deterministic; NER and summarization go through model
//! capabilities with their own timeouts and always degrade (empty groups,
//! extractive summary) instead of failing the job.

pub mod contact;
pub mod entities;
pub mod keyphrases;
pub mod prompts;
pub mod sentiment;
pub mod summary;
pub mod timeline;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::LlmError;
use crate::nlp::contact::{extract_contact_info, ContactInfo};
use crate::nlp::entities::{group_entities, EntityGroups, EntityRecognizer};
use crate::nlp::keyphrases::{extract_key_phrases, text_statistics, TextStatistics};
use crate::nlp::sentiment::{analyze_sentiment, Sentiment};
use crate::nlp::summary::{fallback_summary, summary_input, Summarizer};
use crate::nlp::timeline::{extract_timeline, TimelineEntry};

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("{0} is not configured")]
    Unavailable(&'static str),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnalysis {
    pub entities: EntityGroups,
    pub contact_info: ContactInfo,
    pub timeline: Vec<TimelineEntry>,
    pub sentiment: Sentiment,
    pub summary: String,
    pub key_phrases: Vec<String>,
    pub statistics: TextStatistics,
}

#[derive(Clone)]
pub struct TextAnalyzer {
    recognizer: Arc<dyn EntityRecognizer>,
    summarizer: Arc<dyn Summarizer>,
    model_timeout: Duration,
}

impl TextAnalyzer {
    pub fn new(
        recognizer: Arc<dyn EntityRecognizer>,
        summarizer: Arc<dyn Summarizer>,
        model_timeout: Duration,
    ) -> Self {
        Self {
            recognizer,
            summarizer,
            model_timeout,
        }
    }

    pub async fn analyze(&self, text: &str) -> TextAnalysis {
        let excerpt = summary_input(text);
        let (entities, summary) = tokio::join!(self.entities(text), self.summary(&excerpt));

        TextAnalysis {
            entities,
            contact_info: extract_contact_info(text),
            timeline: extract_timeline(text),
            sentiment: analyze_sentiment(text),
            summary,
            key_phrases: extract_key_phrases(text),
            statistics: text_statistics(text),
        }
    }

    async fn entities(&self, text: &str) -> EntityGroups {
        let call = self.recognizer.recognize(text);
        let result = match tokio::time::timeout(self.model_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(NlpError::Timeout("entity recognition", self.model_timeout)),
        };

        match result {
            Ok(entities) => group_entities(entities),
            Err(NlpError::Unavailable(what)) => {
                debug!("{what} unavailable, skipping entities");
                EntityGroups::new()
            }
            Err(e) => {
                warn!(error = %e, "Entity recognition failed, returning no entities");
                EntityGroups::new()
            }
        }
    }

    async fn summary(&self, excerpt: &str) -> String {
        let call = self.summarizer.summarize(excerpt);
        let result = match tokio::time::timeout(self.model_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(NlpError::Timeout("summarization", self.model_timeout)),
        };

        match result {
            Ok(summary) => summary,
            Err(NlpError::Unavailable(_)) => fallback_summary(excerpt),
            Err(e) => {
                warn!(error = %e, "Summarization failed, using extractive fallback");
                fallback_summary(excerpt)
            }
        }
    }
}
