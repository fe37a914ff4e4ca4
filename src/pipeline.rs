//! # Lead pipeline
//! Sources (concurrent) → dedup → `2 × limit` cap → recency → enrichment pool
//! → prioritizer.
//!
//! A run either returns its leads or an error; nothing partial leaks out of a
//! failed run. Per-candidate failures inside the pool never fail the run.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{LeadRequest, PipelineConfig};
use crate::enrich::types::Resolver;
use crate::enrich::{EnrichmentPool, ItemOutcome};
use crate::ingest::types::SourceProvider;
use crate::ingest::{self, PrepareStats, SourceFailure};
use crate::lead::Lead;
use crate::prioritize::prioritize;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("leads_pipeline_failures_total", "Runs that ended in an error.");
        describe_counter!("leads_prioritized_total", "Leads returned to callers.");
        describe_histogram!("leads_pipeline_ms", "End-to-end run time in milliseconds.");
    });
}

/// Diagnostics of one successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub limit: usize,
    pub days: u32,
    pub max_pages: u32,
    pub sources: usize,
    pub source_failures: Vec<SourceFailure>,
    pub prepare: PrepareStats,
    pub enrich_input: usize,
    pub enrich_workers: usize,
    pub enriched: usize,
    /// Dropped candidates per reason label.
    pub dropped: BTreeMap<&'static str, usize>,
    pub returned: usize,
    /// Returned leads with a known posting time inside the window.
    pub fresh: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub leads: Vec<Lead>,
    pub summary: RunSummary,
}

/// Leads posted strictly after `now - days`. Undated leads don't count.
pub fn count_fresh(leads: &[Lead], now: DateTime<Utc>, days: u32) -> usize {
    let cutoff = now - Duration::days(i64::from(days));
    leads
        .iter()
        .filter(|l| l.posted_at.is_some_and(|t| t > cutoff))
        .count()
}

pub struct LeadPipeline {
    config: PipelineConfig,
    sources: Vec<Arc<dyn SourceProvider>>,
    resolver: Arc<dyn Resolver>,
    diagnostics: Option<UnboundedSender<ItemOutcome>>,
    last_run: RwLock<Option<RunSummary>>,
}

impl LeadPipeline {
    pub fn new(
        config: PipelineConfig,
        sources: Vec<Arc<dyn SourceProvider>>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            config,
            sources,
            resolver,
            diagnostics: None,
            last_run: RwLock::new(None),
        }
    }

    /// Forward every enrichment outcome of every run to `tx`.
    pub fn with_diagnostics(mut self, tx: UnboundedSender<ItemOutcome>) -> Self {
        self.diagnostics = Some(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn last_run(&self) -> Option<RunSummary> {
        match self.last_run.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub async fn run(&self, req: LeadRequest) -> Result<RunReport> {
        self.run_at(req, Utc::now()).await
    }

    /// Run with an explicit "now" (recency cutoff and fresh count use it).
    pub async fn run_at(&self, req: LeadRequest, now: DateTime<Utc>) -> Result<RunReport> {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();

        let result = self.execute(req, now, t0).await;
        histogram!("leads_pipeline_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match result {
            Ok(report) => {
                let mut slot = match self.last_run.write() {
                    Ok(g) => g,
                    Err(poison) => poison.into_inner(),
                };
                *slot = Some(report.summary.clone());
                Ok(report)
            }
            Err(e) => {
                counter!("leads_pipeline_failures_total").increment(1);
                tracing::error!(target: "pipeline", error = ?e, "lead run failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        req: LeadRequest,
        now: DateTime<Utc>,
        t0: std::time::Instant,
    ) -> Result<RunReport> {
        let outcomes = ingest::fan_out(&self.sources, req.days, self.config.max_pages).await;
        let combined = ingest::combine_sources(outcomes, self.config.source_policy)?;
        if !combined.failed.is_empty() {
            let failed: Vec<&str> = combined.failed.iter().map(|f| f.source.as_str()).collect();
            tracing::warn!(
                target: "pipeline",
                failed = ?failed,
                answered = self.sources.len() - failed.len(),
                "continuing without failed sources"
            );
        }
        let (candidates, prepare) = ingest::prepare_candidates(combined.candidates, &req, now);

        let enrich_input = candidates.len();
        let mut pool = EnrichmentPool::new(self.resolver.clone(), &self.config);
        if let Some(tx) = &self.diagnostics {
            pool = pool.with_diagnostics(tx.clone());
        }
        let pooled = pool.run(candidates).await;

        let mut dropped: BTreeMap<&'static str, usize> = BTreeMap::new();
        for d in &pooled.dropped {
            *dropped.entry(d.label).or_default() += 1;
        }

        let enriched = pooled.leads.len();
        let leads = prioritize(pooled.leads, req.limit);
        let fresh = count_fresh(&leads, now, req.days);

        let summary = RunSummary {
            started_at: now,
            elapsed_ms: t0.elapsed().as_millis() as u64,
            limit: req.limit,
            days: req.days,
            max_pages: self.config.max_pages,
            sources: self.sources.len(),
            source_failures: combined.failed,
            prepare,
            enrich_input,
            enrich_workers: pooled.workers,
            enriched,
            dropped,
            returned: leads.len(),
            fresh,
        };
        tracing::info!(
            target: "pipeline",
            limit = req.limit,
            days = req.days,
            enrich_input,
            enriched,
            returned = summary.returned,
            elapsed_ms = summary.elapsed_ms,
            "lead run finished"
        );

        Ok(RunReport { leads, summary })
    }
}
