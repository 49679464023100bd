//! One job, end to end: fetch the raw upload, extract and segment it, then
//! run the skill generators and the text analyzer side by side.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{JobStore, JobStoreError};
use super::{CvAnalysisResult, UploadJob, CANCELLED_DETAIL};
use crate::extraction::{DocumentExtractor, ExtractedDocument, ExtractionError, FileKind};
use crate::nlp::TextAnalyzer;
use crate::skills::{
    merge_candidates, ModelBasedGenerator, PatternBasedGenerator, RuleBasedGenerator, Skill,
    SkillCandidate, SkillGenerator, SkillTaxonomy,
};
use crate::storage::{BlobError, BlobStore};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("Could not read upload: {0}")]
    Blob(#[from] BlobError),

    #[error("Job store unavailable: {0}")]
    Store(#[from] JobStoreError),

    #[error("Skill generator crashed: {0}")]
    Generator(String),

    #[error("{}", CANCELLED_DETAIL)]
    Cancelled,
}

impl PipelineError {
    /// Text recorded as the job's error detail.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

pub struct CvPipeline {
    extractor: DocumentExtractor,
    taxonomy: Arc<SkillTaxonomy>,
    /// Run in this order; candidates are concatenated in the same order.
    generators: Vec<Arc<dyn SkillGenerator>>,
    analyzer: TextAnalyzer,
    blobs: Arc<dyn BlobStore>,
    jobs: Arc<dyn JobStore>,
}

impl CvPipeline {
    pub fn new(
        extractor: DocumentExtractor,
        taxonomy: Arc<SkillTaxonomy>,
        model: ModelBasedGenerator,
        analyzer: TextAnalyzer,
        blobs: Arc<dyn BlobStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        let generators: Vec<Arc<dyn SkillGenerator>> = vec![
            Arc::new(RuleBasedGenerator::new(taxonomy.clone())),
            Arc::new(model),
            Arc::new(PatternBasedGenerator::new()),
        ];
        Self {
            extractor,
            taxonomy,
            generators,
            analyzer,
            blobs,
            jobs,
        }
    }

    pub async fn process(&self, job: &UploadJob) -> Result<CvAnalysisResult, PipelineError> {
        let kind = FileKind::from_filename(&job.filename)?;

        self.ensure_not_cancelled(job.id).await?;
        let bytes = self.blobs.get(&job.blob_key).await?;
        debug!(job_id = %job.id, stage = "fetch", bytes = bytes.len(), "Upload fetched");

        self.ensure_not_cancelled(job.id).await?;
        let document = self.extractor.extract(bytes, kind).await?;
        info!(
            job_id = %job.id,
            stage = "extract",
            method = ?document.method,
            words = document.word_count,
            sections = document.sections.len(),
            "Document extracted"
        );

        self.ensure_not_cancelled(job.id).await?;
        let (skills, analysis) =
            tokio::join!(self.extract_skills(&document), self.analyzer.analyze(&document.text));
        let skills = skills?;
        info!(
            job_id = %job.id,
            stage = "analyze",
            skills = skills.len(),
            entity_groups = analysis.entities.len(),
            "Analysis finished"
        );

        self.ensure_not_cancelled(job.id).await?;
        Ok(CvAnalysisResult::assemble(job, &document, skills, analysis))
    }

    /// All generators in parallel on the blocking pool, then one merge.
    pub async fn extract_skills(
        &self,
        document: &ExtractedDocument,
    ) -> Result<Vec<Skill>, PipelineError> {
        let text: Arc<str> = Arc::from(document.text.as_str());

        let handles: Vec<_> = self
            .generators
            .iter()
            .map(|generator| {
                let generator = generator.clone();
                let text = text.clone();
                tokio::task::spawn_blocking(move || generator.generate(&text))
            })
            .collect();

        let mut candidates: Vec<SkillCandidate> = Vec::new();
        for (generator, handle) in self.generators.iter().zip(handles) {
            let batch = handle
                .await
                .map_err(|e| PipelineError::Generator(e.to_string()))?;
            debug!(source = ?generator.source(), candidates = batch.len(), "Generator finished");
            candidates.extend(batch);
        }

        let taxonomy = self.taxonomy.clone();
        let sections = document.sections.clone();
        tokio::task::spawn_blocking(move || {
            merge_candidates(&candidates, &text, &sections, &taxonomy)
        })
        .await
        .map_err(|e| PipelineError::Generator(e.to_string()))
    }

    async fn ensure_not_cancelled(&self, id: Uuid) -> Result<(), PipelineError> {
        match self.jobs.get(id).await? {
            Some(job) if job.cancel_requested => Err(PipelineError::Cancelled),
            Some(_) => Ok(()),
            None => Err(JobStoreError::NotFound(id).into()),
        }
    }
}
