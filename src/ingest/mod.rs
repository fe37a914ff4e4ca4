// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::{LeadRequest, SourcePolicy};
use crate::ingest::types::{SourceOutcome, SourceProvider};
use crate::lead::Candidate;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "leads_source_candidates_total",
            "Raw candidates returned by each source."
        );
        describe_counter!("leads_source_errors_total", "Source fetch/parse errors.");
        describe_counter!(
            "leads_dedup_removed_total",
            "Candidates removed as duplicates of an earlier identity key."
        );
        describe_counter!(
            "leads_recency_filtered_total",
            "Candidates older than the recency window."
        );
        describe_histogram!("leads_source_fetch_ms", "Source fetch time in milliseconds.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // Typographic quotes/dashes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2013}', '\u{2014}'], "-");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Call every source concurrently with the same parameters.
/// Outcomes come back in source order, whatever the completion order was.
pub async fn fan_out(
    providers: &[Arc<dyn SourceProvider>],
    days: u32,
    max_pages: u32,
) -> Vec<SourceOutcome> {
    ensure_metrics_described();

    let calls = providers.iter().map(|p| async move {
        let t0 = std::time::Instant::now();
        let result = p.fetch_candidates(days, max_pages).await;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        metrics::histogram!("leads_source_fetch_ms", "source" => p.name().to_string()).record(ms);

        match &result {
            Ok(v) => {
                counter!("leads_source_candidates_total", "source" => p.name().to_string())
                    .increment(v.len() as u64);
                tracing::debug!(target: "ingest", source = p.name(), count = v.len(), ms, "source fetched");
            }
            Err(e) => {
                counter!("leads_source_errors_total", "source" => p.name().to_string())
                    .increment(1);
                tracing::warn!(target: "ingest", error = ?e, source = p.name(), "source error");
            }
        }
        SourceOutcome {
            source: p.name().to_string(),
            result,
        }
    });

    futures::future::join_all(calls).await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Candidates of all sources concatenated (source order, then in-source order).
#[derive(Debug, Default)]
pub struct Combined {
    pub candidates: Vec<Candidate>,
    pub failed: Vec<SourceFailure>,
}

/// Apply the source policy to a fan-out.
///
/// `Strict` fails on the first failed source. `Isolated` skips failed sources
/// and only fails when there were sources and none of them answered.
pub fn combine_sources(outcomes: Vec<SourceOutcome>, policy: SourcePolicy) -> Result<Combined> {
    let total = outcomes.len();
    let mut out = Combined::default();

    for o in outcomes {
        match o.result {
            Ok(mut v) => out.candidates.append(&mut v),
            Err(e) if policy == SourcePolicy::Strict => {
                return Err(e.context(format!("source {} failed", o.source)));
            }
            Err(e) => out.failed.push(SourceFailure {
                source: o.source,
                error: format!("{e:#}"),
            }),
        }
    }

    if total > 0 && out.failed.len() == total {
        let detail = out
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.source, f.error))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(anyhow!("all {total} sources failed ({detail})"));
    }
    Ok(out)
}

/// Keep the first candidate per identity key, preserving order.
/// Returns (kept, removed_count).
pub fn dedup_by_identity(candidates: Vec<Candidate>) -> (Vec<Candidate>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut keep = Vec::with_capacity(candidates.len());
    let mut removed = 0usize;

    for c in candidates {
        if seen.insert(c.identity_key()) {
            keep.push(c);
        } else {
            removed += 1;
        }
    }
    (keep, removed)
}

/// Drop candidates posted before `now - days`. Unknown posting time is kept,
/// and a posting exactly at the cutoff is kept.
/// Returns (kept, removed_count).
pub fn filter_recent(
    candidates: Vec<Candidate>,
    now: DateTime<Utc>,
    days: u32,
) -> (Vec<Candidate>, usize) {
    let cutoff = now - Duration::days(i64::from(days));
    let before = candidates.len();
    let keep: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.posted_at.map_or(true, |t| t >= cutoff))
        .collect();
    let removed = before - keep.len();
    (keep, removed)
}

/// Counts of what `prepare_candidates` threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrepareStats {
    pub merged: usize,
    pub dedup_removed: usize,
    pub oversample_cut: usize,
    pub recency_removed: usize,
}

/// Dedup → oversample cap (`2 × limit`) → recency filter.
pub fn prepare_candidates(
    candidates: Vec<Candidate>,
    req: &LeadRequest,
    now: DateTime<Utc>,
) -> (Vec<Candidate>, PrepareStats) {
    ensure_metrics_described();

    let merged = candidates.len();
    let (mut unique, dedup_removed) = dedup_by_identity(candidates);

    let cap = req.oversample();
    let oversample_cut = unique.len().saturating_sub(cap);
    unique.truncate(cap);

    let (fresh, recency_removed) = filter_recent(unique, now, req.days);

    counter!("leads_dedup_removed_total").increment(dedup_removed as u64);
    counter!("leads_recency_filtered_total").increment(recency_removed as u64);
    tracing::info!(
        target: "ingest",
        merged,
        dedup_removed,
        oversample_cut,
        recency_removed,
        kept = fresh.len(),
        "candidates prepared"
    );

    (
        fresh,
        PrepareStats {
            merged,
            dedup_removed,
            oversample_cut,
            recency_removed,
        },
    )
}
