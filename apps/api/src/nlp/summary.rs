use async_trait::async_trait;

use crate::llm_client::LlmClient;
use crate::nlp::prompts::{summary_prompt, SUMMARY_SYSTEM};
use crate::nlp::NlpError;

/// Only this many leading characters are summarized.
pub const SUMMARY_INPUT_CHARS: usize = 1024;
const MIN_SUMMARY_WORDS: u32 = 50;
const MAX_SUMMARY_WORDS: u32 = 150;
const SUMMARY_MAX_TOKENS: u32 = 300;

/// Capability boundary for abstractive summarization.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, excerpt: &str) -> Result<String, NlpError>;
}

pub fn summary_input(text: &str) -> String {
    text.chars().take(SUMMARY_INPUT_CHARS).collect()
}

/// First three `.`-separated sentences of `excerpt`, joined by `. `.
/// Pieces are trimmed and blank ones skipped, so line breaks and stray
/// spacing never reach the summary.
pub fn fallback_summary(excerpt: &str) -> String {
    excerpt
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join(". ")
}

pub struct LlmSummarizer {
    llm: LlmClient,
}

impl LlmSummarizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, excerpt: &str) -> Result<String, NlpError> {
        let prompt = summary_prompt(excerpt, MIN_SUMMARY_WORDS, MAX_SUMMARY_WORDS);
        Ok(self
            .llm
            .complete(&prompt, SUMMARY_SYSTEM, SUMMARY_MAX_TOKENS)
            .await?)
    }
}

pub struct UnavailableSummarizer;

#[async_trait]
impl Summarizer for UnavailableSummarizer {
    async fn summarize(&self, _excerpt: &str) -> Result<String, NlpError> {
        Err(NlpError::Unavailable("summarization"))
    }
}
