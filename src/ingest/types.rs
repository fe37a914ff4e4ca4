// src/ingest/types.rs
use anyhow::Result;

use crate::lead::Candidate;

/// A job listing source. Each call returns raw candidates posted within
/// `days`, reading at most `max_pages` result pages.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_candidates(&self, days: u32, max_pages: u32) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
}

/// Per-source result of a fan-out, in source order.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: String,
    pub result: Result<Vec<Candidate>>,
}
