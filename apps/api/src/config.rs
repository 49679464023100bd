use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// NER and summarization degrade to local fallbacks without it.
    pub anthropic_api_key: Option<String>,
    pub identity_verify_url: String,
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
    pub worker_concurrency: usize,
    pub ocr_timeout_secs: u64,
    pub model_timeout_secs: u64,
    pub job_timeout_secs: u64,
    pub presigned_url_ttl_secs: u64,
    /// Built-in lexicon when unset.
    pub skill_taxonomy_path: Option<PathBuf>,
    /// Model-based skill generator is disabled when unset.
    pub skill_model_path: Option<PathBuf>,
    pub ocr_languages: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            identity_verify_url: require_env("IDENTITY_VERIFY_URL")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 4)?,
            ocr_timeout_secs: parse_env("OCR_TIMEOUT_SECS", 30)?,
            model_timeout_secs: parse_env("MODEL_TIMEOUT_SECS", 20)?,
            job_timeout_secs: parse_env("JOB_TIMEOUT_SECS", 300)?,
            presigned_url_ttl_secs: parse_env("PRESIGNED_URL_TTL_SECS", 3600)?,
            skill_taxonomy_path: optional_env("SKILL_TAXONOMY_PATH").map(PathBuf::from),
            skill_model_path: optional_env("SKILL_MODEL_PATH").map(PathBuf::from),
            ocr_languages: parse_languages(
                &std::env::var("OCR_LANGUAGES").unwrap_or_else(|_| "eng".to_string()),
            ),
        })
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn presigned_url_ttl(&self) -> Duration {
        Duration::from_secs(self.presigned_url_ttl_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// `eng+deu` or `eng,deu`; empty falls back to `eng`.
fn parse_languages(raw: &str) -> Vec<String> {
    let languages: Vec<String> = raw
        .split(['+', ','])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if languages.is_empty() {
        vec!["eng".to_string()]
    } else {
        languages
    }
}
