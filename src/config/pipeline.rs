// src/config/pipeline.rs
//! Pipeline knobs. Built once at startup (`from_env`) and handed to the
//! pipeline constructor; request-scoped values (`limit`, `days`) come from the
//! query string through [`LeadRequest::from_query`].

use std::time::Duration;

// --- env names ---
pub const ENV_MAX_PAGES: &str = "SCRAPE_MAX_PAGES";
pub const ENV_RESOLVER_TIMEOUT_SECS: &str = "LEADS_RESOLVER_TIMEOUT_SECS";
pub const ENV_STRICT_SOURCES: &str = "LEADS_STRICT_SOURCES";

// --- bounds & defaults ---
pub const DEFAULT_LIMIT: i64 = 100;
pub const LIMIT_MIN: i64 = 50;
pub const LIMIT_MAX: i64 = 250;

pub const DEFAULT_DAYS: i64 = 1;
pub const DAYS_MIN: i64 = 1;
pub const DAYS_MAX: i64 = 3;

pub const DEFAULT_MAX_PAGES: i64 = 2;
pub const MAX_PAGES_MIN: i64 = 1;
pub const MAX_PAGES_MAX: i64 = 5;

/// Upper bound on enrichment workers.
pub const FIXED_POOL_SIZE: usize = 6;
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 20;

/// Staggered delay before each enrichment item:
/// `base + (index mod concurrency) * step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub base: Duration,
    pub step: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            step: Duration::from_millis(50),
        }
    }
}

impl Pacing {
    /// No waiting at all; handy for tests.
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            step: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, index: usize, concurrency: usize) -> Duration {
        let slot = (index % concurrency.max(1)) as u32;
        self.base + self.step * slot
    }
}

/// What happens when a source adapter fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcePolicy {
    /// Keep going with the sources that answered. Fails only if all of them failed.
    #[default]
    Isolated,
    /// One failing source fails the whole run.
    Strict,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_pages: u32,
    pub concurrency: usize,
    pub pacing: Pacing,
    /// Per resolver call. `None` waits forever.
    pub resolver_timeout: Option<Duration>,
    pub source_policy: SourcePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES as u32,
            concurrency: FIXED_POOL_SIZE,
            pacing: Pacing::default(),
            resolver_timeout: Some(Duration::from_secs(DEFAULT_RESOLVER_TIMEOUT_SECS)),
            source_policy: SourcePolicy::Isolated,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an explicit variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_pages = clamp_int(
            lookup(ENV_MAX_PAGES).as_deref(),
            DEFAULT_MAX_PAGES,
            MAX_PAGES_MIN,
            MAX_PAGES_MAX,
        ) as u32;

        let resolver_timeout = match lookup(ENV_RESOLVER_TIMEOUT_SECS)
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(DEFAULT_RESOLVER_TIMEOUT_SECS)),
        };

        let strict = lookup(ENV_STRICT_SOURCES)
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
            .unwrap_or(false);

        Self {
            max_pages,
            resolver_timeout,
            source_policy: if strict {
                SourcePolicy::Strict
            } else {
                SourcePolicy::Isolated
            },
            ..Self::default()
        }
    }
}

/// Per-request knobs, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadRequest {
    pub limit: usize,
    pub days: u32,
}

impl Default for LeadRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT as usize,
            days: DEFAULT_DAYS as u32,
        }
    }
}

impl LeadRequest {
    /// Malformed values fall back to defaults, never to an error.
    pub fn from_query(limit: Option<&str>, days: Option<&str>) -> Self {
        Self {
            limit: clamp_int(limit, DEFAULT_LIMIT, LIMIT_MIN, LIMIT_MAX) as usize,
            days: clamp_int(days, DEFAULT_DAYS, DAYS_MIN, DAYS_MAX) as u32,
        }
    }

    /// How many deduplicated candidates are kept for enrichment.
    pub fn oversample(&self) -> usize {
        self.limit.saturating_mul(2)
    }
}

/// Parse the leading integer of `raw` (`"120abc"` → 120) and clamp it.
/// Absent or non-numeric input yields `def`.
pub fn clamp_int(raw: Option<&str>, def: i64, min: i64, max: i64) -> i64 {
    let n = raw.and_then(parse_leading_int).unwrap_or(def);
    n.clamp(min, max)
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (neg, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    // Saturate on absurdly long digit runs; clamping happens afterwards anyway.
    let v = rest[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if neg { -v } else { v })
}
