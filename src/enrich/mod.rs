// src/enrich/mod.rs
//! Enrichment pool.
//!
//! A fixed number of workers share one atomic cursor over the candidate list.
//! Every `fetch_add` hands out a distinct index, so each candidate is enriched
//! by exactly one worker no matter how the runtime schedules them. Workers
//! race independently; results are collected in completion order.
//!
//! A failing candidate (resolver error, timeout, invalid merged record) is
//! dropped on its own. The worker moves on to its next index.

pub mod types;
pub mod web;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::config::{Pacing, PipelineConfig};
use crate::enrich::types::Resolver;
use crate::lead::{Candidate, ContactDetails, Lead, LeadError};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("leads_enrich_kept_total", "Candidates enriched and validated.");
        describe_counter!(
            "leads_enrich_dropped_total",
            "Candidates dropped during enrichment, by reason."
        );
    });
}

/// Short, non-reversible id for logging a candidate without its name.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    #[error("resolver failed: {0}")]
    Resolver(String),
    #[error("resolver call timed out")]
    Timeout,
    #[error("invalid record: {0}")]
    Invalid(#[from] LeadError),
}

impl DropReason {
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::Resolver(_) => "resolver",
            DropReason::Timeout => "timeout",
            DropReason::Invalid(_) => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedItem {
    pub index: usize,
    /// Identity key of the candidate.
    pub key: String,
    pub reason: String,
    pub label: &'static str,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Kept {
        index: usize,
        lead: Lead,
    },
    Dropped {
        index: usize,
        key: String,
        reason: DropReason,
    },
}

impl ItemOutcome {
    pub fn index(&self) -> usize {
        match self {
            ItemOutcome::Kept { index, .. } | ItemOutcome::Dropped { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    /// Completion order, not input order.
    pub leads: Vec<Lead>,
    pub dropped: Vec<DroppedItem>,
    pub workers: usize,
}

pub struct EnrichmentPool {
    resolver: Arc<dyn Resolver>,
    concurrency: usize,
    pacing: Pacing,
    timeout: Option<Duration>,
    diagnostics: Option<UnboundedSender<ItemOutcome>>,
}

impl EnrichmentPool {
    pub fn new(resolver: Arc<dyn Resolver>, cfg: &PipelineConfig) -> Self {
        Self {
            resolver,
            concurrency: cfg.concurrency.max(1),
            pacing: cfg.pacing,
            timeout: cfg.resolver_timeout,
            diagnostics: None,
        }
    }

    /// Every outcome is also sent to `tx` as soon as its candidate finishes,
    /// while the run is still going. A closed receiver is ignored.
    pub fn with_diagnostics(mut self, tx: UnboundedSender<ItemOutcome>) -> Self {
        self.diagnostics = Some(tx);
        self
    }

    pub fn workers_for(&self, candidates: usize) -> usize {
        self.concurrency.min(candidates)
    }

    pub async fn run(&self, candidates: Vec<Candidate>) -> PoolReport {
        ensure_metrics_described();

        let total = candidates.len();
        let workers = self.workers_for(total);
        if workers == 0 {
            return PoolReport::default();
        }

        let cursor = AtomicUsize::new(0);
        let (tx, mut rx) = mpsc::unbounded_channel::<ItemOutcome>();

        let cursor = &cursor;
        let candidates = &candidates;
        let loops = (0..workers).map(|worker| {
            let tx = tx.clone();
            async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= total {
                        break;
                    }
                    tokio::time::sleep(self.pacing.delay_for(index, self.concurrency)).await;
                    let outcome = self.enrich_one(index, &candidates[index]).await;
                    tracing::trace!(target: "enrich", worker, index, "item done");
                    if let Some(diag) = &self.diagnostics {
                        let _ = diag.send(outcome.clone());
                    }
                    // Receiver lives until all workers are joined.
                    let _ = tx.send(outcome);
                }
            }
        });
        futures::future::join_all(loops).await;
        drop(tx);

        let mut report = PoolReport {
            workers,
            ..Default::default()
        };
        while let Some(outcome) = rx.recv().await {
            match outcome {
                ItemOutcome::Kept { lead, .. } => {
                    counter!("leads_enrich_kept_total").increment(1);
                    report.leads.push(lead);
                }
                ItemOutcome::Dropped { index, key, reason } => {
                    counter!("leads_enrich_dropped_total", "reason" => reason.label())
                        .increment(1);
                    tracing::debug!(
                        target: "enrich",
                        index,
                        id = %anon_hash(&key),
                        reason = %reason,
                        "candidate dropped"
                    );
                    report.dropped.push(DroppedItem {
                        index,
                        key,
                        label: reason.label(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            target: "enrich",
            workers,
            total,
            kept = report.leads.len(),
            dropped = report.dropped.len(),
            "enrichment finished"
        );
        report
    }

    async fn enrich_one(&self, index: usize, candidate: &Candidate) -> ItemOutcome {
        match self.try_enrich(candidate).await {
            Ok(lead) => ItemOutcome::Kept { index, lead },
            Err(reason) => ItemOutcome::Dropped {
                index,
                key: candidate.identity_key(),
                reason,
            },
        }
    }

    async fn try_enrich(&self, candidate: &Candidate) -> Result<Lead, DropReason> {
        let website = self
            .call(self.resolver.find_website(
                &candidate.practice_name,
                candidate.location.city.as_deref(),
                candidate.location.state.as_deref(),
            ))
            .await?;

        let contacts = match website.as_deref() {
            Some(url) => self.call(self.resolver.extract_contacts(url)).await?,
            None => ContactDetails::default(),
        };

        let merged = candidate.clone().merge_enrichment(website, contacts);
        merged.validate()?;
        Ok(merged)
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, DropReason>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let res = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| DropReason::Timeout)?,
            None => fut.await,
        };
        res.map_err(|e| DropReason::Resolver(format!("{e:#}")))
    }
}
