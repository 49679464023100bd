//! Orchestrator: upload jobs, their durable queue, and the background
//! pipeline that turns a stored upload into a [`CvAnalysisResult`].

pub mod notifier;
pub mod pipeline;
pub mod queue;
pub mod runner;
pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extraction::{DocumentMetadata, ExtractedDocument, ExtractionMethod};
use crate::nlp::contact::ContactInfo;
use crate::nlp::entities::EntityGroups;
use crate::nlp::keyphrases::TextStatistics;
use crate::nlp::sentiment::Sentiment;
use crate::nlp::timeline::TimelineEntry;
use crate::nlp::TextAnalysis;
use crate::skills::Skill;

/// Error detail recorded on a job that stopped because its owner asked.
pub const CANCELLED_DETAIL: &str = "cancelled";

// ────────────────────────────────────────────────────────────────────────────
// Job lifecycle
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// `pending -> processing -> completed | failed`. A pending job may also
    /// fail directly when it could not be enqueued.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Durable record of one upload. Only the orchestrator mutates it, and never
/// after it reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: Uuid,
    pub owner_id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: JobStatus,
    /// Present only when `status` is `failed`.
    pub error: Option<String>,
    pub blob_key: String,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadJob {
    pub fn new(
        owner_id: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        size_bytes: usize,
    ) -> Self {
        let id = Uuid::new_v4();
        let owner_id = owner_id.into();
        let filename = filename.into();
        let now = Utc::now();
        Self {
            blob_key: crate::storage::blob_key(&owner_id, id, &filename),
            id,
            owner_id,
            filename,
            content_type: content_type.into(),
            size_bytes: size_bytes as i64,
            status: JobStatus::Pending,
            error: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis result
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDigest {
    pub page_count: Option<usize>,
    pub word_count: usize,
    pub metadata: DocumentMetadata,
    pub sections: Vec<String>,
    pub method: ExtractionMethod,
}

impl From<&ExtractedDocument> for DocumentDigest {
    fn from(document: &ExtractedDocument) -> Self {
        Self {
            page_count: document.metadata.page_count,
            word_count: document.word_count,
            metadata: document.metadata.clone(),
            sections: document.sections.keys().cloned().collect(),
            method: document.method,
        }
    }
}

/// Everything one successful pipeline run produced. Written once; a later
/// run for the same job replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvAnalysisResult {
    pub job_id: Uuid,
    pub owner_id: String,
    pub skills: Vec<Skill>,
    pub entities: EntityGroups,
    pub contact_info: ContactInfo,
    pub timeline: Vec<TimelineEntry>,
    pub sentiment: Sentiment,
    pub summary: String,
    pub key_phrases: Vec<String>,
    pub statistics: TextStatistics,
    pub document: DocumentDigest,
    pub completed_at: DateTime<Utc>,
}

impl CvAnalysisResult {
    pub fn assemble(
        job: &UploadJob,
        document: &ExtractedDocument,
        skills: Vec<Skill>,
        analysis: TextAnalysis,
    ) -> Self {
        Self {
            job_id: job.id,
            owner_id: job.owner_id.clone(),
            skills,
            entities: analysis.entities,
            contact_info: analysis.contact_info,
            timeline: analysis.timeline,
            sentiment: analysis.sentiment,
            summary: analysis.summary,
            key_phrases: analysis.key_phrases,
            statistics: analysis.statistics,
            document: DocumentDigest::from(document),
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        for terminal in [Completed, Failed] {
            for next in [Pending, Processing, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_new_job_is_pending_with_blob_key() {
        let job = UploadJob::new("user-1", "My CV.pdf", "application/pdf", 2048);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.id.get_version_num(), 4);
        assert_eq!(job.blob_key, format!("cvs/user-1/{}/My_CV.pdf", job.id));
        assert!(job.error.is_none());
        assert!(!job.cancel_requested);
    }
}
