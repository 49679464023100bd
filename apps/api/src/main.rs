mod auth;
mod config;
mod cv;
mod db;
mod errors;
mod extraction;
mod jobs;
mod llm_client;
mod nlp;
mod routes;
mod sections;
mod skills;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::HttpIdentityVerifier;
use crate::config::Config;
use crate::db::create_pool;
use crate::extraction::{ocr, DocumentExtractor};
use crate::jobs::notifier::RedisNotifier;
use crate::jobs::pipeline::CvPipeline;
use crate::jobs::queue::{JobQueue, RedisJobQueue};
use crate::jobs::runner::{spawn_worker_pool, WorkerContext};
use crate::jobs::store::PgJobStore;
use crate::llm_client::LlmClient;
use crate::nlp::entities::{EntityRecognizer, LlmEntityRecognizer, UnavailableRecognizer};
use crate::nlp::summary::{LlmSummarizer, Summarizer, UnavailableSummarizer};
use crate::nlp::TextAnalyzer;
use crate::routes::build_router;
use crate::skills::model_based::SkillModel;
use crate::skills::{ModelBasedGenerator, SkillTaxonomy};
use crate::state::AppState;
use crate::storage::S3BlobStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let jobs = Arc::new(PgJobStore::new(db));

    // Initialize Redis: durable job queue and completion events
    let redis = redis::Client::open(config.redis_url.clone())?;
    let queue = Arc::new(RedisJobQueue::connect(&redis).await?);
    let notifier = Arc::new(RedisNotifier::new(
        redis.get_multiplexed_async_connection().await?,
    ));
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let blobs = Arc::new(S3BlobStore::new(
        build_s3_client(&config).await,
        config.s3_bucket.clone(),
    ));
    info!("S3 client initialized");

    // Model backends for NER and summarization
    let (recognizer, summarizer): (Arc<dyn EntityRecognizer>, Arc<dyn Summarizer>) =
        match &config.anthropic_api_key {
            Some(key) => {
                let llm = LlmClient::new(key.clone())?;
                info!("LLM client initialized (model: {})", llm_client::MODEL);
                (
                    Arc::new(LlmEntityRecognizer::new(llm.clone())),
                    Arc::new(LlmSummarizer::new(llm)),
                )
            }
            None => {
                warn!("ANTHROPIC_API_KEY not set; entities disabled, summaries are extractive");
                (Arc::new(UnavailableRecognizer), Arc::new(UnavailableSummarizer))
            }
        };
    let analyzer = TextAnalyzer::new(recognizer, summarizer, config.model_timeout());

    // Skill taxonomy and optional classifier, shared read-only by every job
    let taxonomy = Arc::new(match &config.skill_taxonomy_path {
        Some(path) => SkillTaxonomy::load(path)
            .with_context(|| format!("Failed to load skill taxonomy from {}", path.display()))?,
        None => SkillTaxonomy::default(),
    });
    info!(skills = taxonomy.skills.len(), "Skill taxonomy loaded");
    let model = load_skill_model(&config);

    let extractor = DocumentExtractor::new(
        ocr::default_engine(&config.ocr_languages),
        config.ocr_timeout(),
    );
    let pipeline = Arc::new(CvPipeline::new(
        extractor,
        taxonomy,
        model,
        analyzer,
        blobs.clone(),
        jobs.clone(),
    ));

    // Background workers: re-queue anything a previous run left in flight
    queue.recover().await?;
    spawn_worker_pool(
        Arc::new(WorkerContext {
            pipeline,
            jobs: jobs.clone(),
            queue: queue.clone(),
            notifier,
            job_timeout: config.job_timeout(),
        }),
        config.worker_concurrency,
    );

    let identity = Arc::new(HttpIdentityVerifier::new(config.identity_verify_url.clone())?);

    // Build app state
    let state = AppState {
        jobs,
        queue,
        blobs,
        identity,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// A broken model artifact disables the model generator instead of
/// blocking startup.
fn load_skill_model(config: &Config) -> ModelBasedGenerator {
    let Some(path) = &config.skill_model_path else {
        info!("SKILL_MODEL_PATH not set; model-based skill generator disabled");
        return ModelBasedGenerator::unavailable();
    };
    match SkillModel::load(path) {
        Ok(model) => ModelBasedGenerator::new(model),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skill model unavailable, continuing without it");
            ModelBasedGenerator::unavailable()
        }
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "cv-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
