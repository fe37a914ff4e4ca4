// tests/common/mod.rs
// Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use lead_harvester::config::{Pacing, PipelineConfig};
use lead_harvester::enrich::types::Resolver;
use lead_harvester::ingest::types::SourceProvider;
use lead_harvester::{Candidate, ContactDetails, Lead, Location};

pub fn austin(name: &str) -> Candidate {
    Lead::new(name, Location::new(Some("Austin"), Some("TX"), None))
}

/// Fast config: no pacing, default pool size.
pub fn quick_config() -> PipelineConfig {
    PipelineConfig {
        pacing: Pacing::none(),
        ..PipelineConfig::default()
    }
}

/// Source returning a fixed list, or failing.
pub struct StaticSource {
    pub name: &'static str,
    pub candidates: Vec<Candidate>,
    pub fail: bool,
    pub calls: Mutex<Vec<(u32, u32)>>,
}

impl StaticSource {
    pub fn ok(name: &'static str, candidates: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            name,
            candidates,
            fail: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            candidates: Vec::new(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SourceProvider for StaticSource {
    async fn fetch_candidates(&self, days: u32, max_pages: u32) -> Result<Vec<Candidate>> {
        self.calls.lock().push((days, max_pages));
        if self.fail {
            return Err(anyhow!("{} is down", self.name));
        }
        Ok(self.candidates.clone())
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// How the scripted resolver answers for one practice name.
#[derive(Clone)]
pub enum Script {
    /// Website found, these contacts extracted.
    Site(ContactDetails),
    /// No website.
    NoSite,
    /// `find_website` errors.
    SearchError,
    /// `extract_contacts` errors.
    ExtractError,
    /// `find_website` never finishes in reasonable time.
    Hang,
}

/// Instrumented resolver: counts calls per practice name and tracks in-flight calls.
pub struct ScriptedResolver {
    scripts: HashMap<String, Script>,
    fallback: Script,
    pub find_calls: Mutex<HashMap<String, usize>>,
    pub extract_calls: Mutex<HashMap<String, usize>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Random extra latency per call, up to this many ms.
    pub jitter_ms: u64,
}

impl ScriptedResolver {
    pub fn new(fallback: Script) -> Self {
        Self {
            scripts: HashMap::new(),
            fallback,
            find_calls: Mutex::new(HashMap::new()),
            extract_calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            jitter_ms: 0,
        }
    }

    pub fn with(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    pub fn with_jitter(mut self, ms: u64) -> Self {
        self.jitter_ms = ms;
        self
    }

    fn script_for(&self, name: &str) -> Script {
        self.scripts.get(name).cloned().unwrap_or_else(|| self.fallback.clone())
    }

    async fn latency(&self) {
        if self.jitter_ms > 0 {
            let ms = rand::random_range(0..=self.jitter_ms);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    pub fn find_count(&self, name: &str) -> usize {
        self.find_calls.lock().get(name).copied().unwrap_or(0)
    }

    pub fn extract_count(&self, name: &str) -> usize {
        self.extract_calls.lock().get(name).copied().unwrap_or(0)
    }
}

pub fn phone_contacts(phone: &str) -> ContactDetails {
    ContactDetails {
        phone: Some(phone.to_string()),
        ..Default::default()
    }
}

fn site_for(name: &str) -> String {
    let slug: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    format!("https://{slug}.example/")
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn find_website(
        &self,
        name: &str,
        _city: Option<&str>,
        _state: Option<&str>,
    ) -> Result<Option<String>> {
        *self.find_calls.lock().entry(name.to_string()).or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.latency().await;
        let script = self.script_for(name);
        if matches!(script, Script::Hang) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script {
            Script::NoSite => Ok(None),
            Script::SearchError => Err(anyhow!("search backend unavailable")),
            _ => Ok(Some(site_for(name))),
        }
    }

    async fn extract_contacts(&self, url: &str) -> Result<ContactDetails> {
        let name = self
            .scripts
            .keys()
            .find(|n| site_for(n) == url)
            .cloned();
        let key = name.clone().unwrap_or_else(|| url.to_string());
        *self.extract_calls.lock().entry(key).or_default() += 1;

        self.latency().await;
        let script = match name {
            Some(n) => self.script_for(&n),
            None => self.fallback.clone(),
        };
        match script {
            Script::Site(c) => Ok(c),
            Script::ExtractError => Err(anyhow!("page fetch failed")),
            _ => Ok(ContactDetails::default()),
        }
    }
}
