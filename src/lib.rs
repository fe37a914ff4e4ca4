// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod api;
pub mod config;
pub mod enrich;
pub mod export;
pub mod ingest;
pub mod lead;
pub mod metrics;
pub mod pipeline;
pub mod prioritize;

use std::sync::Arc;

use anyhow::Result;

pub use crate::api::router;
pub use crate::lead::{Candidate, ContactDetails, Lead, Location};
pub use crate::pipeline::{LeadPipeline, RunReport, RunSummary};

use crate::config::PipelineConfig;
use crate::enrich::web::WebResolver;
use crate::ingest::providers::job_feed::{feed_client, JobFeedProvider};
use crate::ingest::types::SourceProvider;

/// Build the production pipeline: feeds from the sources config, web resolver
/// from env, knobs from env.
pub fn pipeline_from_env() -> Result<LeadPipeline> {
    let config = PipelineConfig::from_env();
    let feeds = ingest::config::load_sources_default()?;
    let client = feed_client()?;

    let sources: Vec<Arc<dyn SourceProvider>> = feeds
        .iter()
        .map(|f| Arc::new(JobFeedProvider::from_spec(f, client.clone())) as Arc<dyn SourceProvider>)
        .collect();
    if sources.is_empty() {
        tracing::warn!("no job feeds configured; runs will return no leads");
    }

    let resolver = Arc::new(WebResolver::from_env()?);
    tracing::info!(
        sources = sources.len(),
        max_pages = config.max_pages,
        concurrency = config.concurrency,
        policy = ?config.source_policy,
        "pipeline configured"
    );
    Ok(LeadPipeline::new(config, sources, resolver))
}
