// src/enrich/web.rs
//! HTTP resolver: finds a practice website through a search endpoint and
//! scrapes contact details from it.
//!
//! The parsing halves (`pick_website`, `contacts_from_html`) are pure so they
//! can be tested against captured pages.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use strsim::jaro_winkler;

use crate::enrich::types::Resolver;
use crate::ingest::normalize_text;
use crate::lead::ContactDetails;

pub const ENV_SEARCH_URL: &str = "LEADS_SEARCH_URL";
pub const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Minimum Jaro-Winkler similarity between practice name and host label.
pub const MIN_HOST_SIMILARITY: f64 = 0.70;

/// Hosts that list practices but are never the practice's own site.
const BLOCKED_HOSTS: &[&str] = &[
    "duckduckgo",
    "google",
    "bing.com",
    "yelp",
    "facebook",
    "instagram",
    "linkedin",
    "twitter",
    "x.com",
    "youtube",
    "tiktok",
    "pinterest",
    "indeed",
    "ziprecruiter",
    "careerbuilder",
    "glassdoor",
    "simplyhired",
    "monster",
    "healthgrades",
    "zocdoc",
    "opencare",
    "yellowpages",
    "mapquest",
    "bbb.org",
    "nextdoor",
    "wikipedia",
];

static RE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("href regex"));
static RE_SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>").expect("script regex")
});
static RE_TEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']tel:([^"']+)["']"#).expect("tel regex"));
static RE_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[\s.\-]?)?\(?\b(\d{3})\)?[\s.\-]?(\d{3})[\s.\-](\d{4})\b").expect("phone regex")
});
static RE_MAILTO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)mailto:([^"'?>\s]+)"#).expect("mailto regex"));
static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}").expect("email regex")
});
static RE_DOCTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bDr\.?\s+([A-Z][a-z]+(?:\s+[A-Z]\.)?\s+[A-Z][A-Za-z'\-]+)").expect("doctor regex")
});

/// Lowercase alphanumerics only.
fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Turn a search-result href into an absolute target URL.
/// Redirect links (`/l/?uddg=<target>`) are unwrapped.
fn result_target(href: &str) -> Option<Url> {
    let href = html_escape::decode_html_entities(href);
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
        return Url::parse(&target).ok();
    }
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn is_blocked(host: &str) -> bool {
    BLOCKED_HOSTS.iter().any(|b| host.contains(b))
}

/// Pick the result whose host looks most like the practice name.
/// Returns `scheme://host/` of the best match above [`MIN_HOST_SIMILARITY`].
pub fn pick_website(search_html: &str, practice: &str) -> Option<String> {
    let wanted = squash(practice);
    if wanted.is_empty() {
        return None;
    }

    let mut best: Option<(f64, String)> = None;
    let mut seen = BTreeSet::new();
    for caps in RE_HREF.captures_iter(search_html) {
        let Some(url) = caps.get(1).and_then(|m| result_target(m.as_str())) else {
            continue;
        };
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            continue;
        };
        if is_blocked(&host) || !seen.insert(host.clone()) {
            continue;
        }
        let label = host.trim_start_matches("www.").split('.').next().unwrap_or_default();
        let score = jaro_winkler(&wanted, &squash(label));
        if score >= MIN_HOST_SIMILARITY && best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, format!("{}://{}/", url.scheme(), host)));
        }
    }
    best.map(|(_, site)| site)
}

fn format_us_phone(raw: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    (digits.len() == 10).then(|| format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]))
}

fn plausible_email(e: &str) -> bool {
    let lower = e.to_ascii_lowercase();
    let asset = [".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext));
    let noise = ["example.com", "sentry", "wixpress", "domain.com"]
        .iter()
        .any(|n| lower.contains(n));
    !asset && !noise
}

fn size_label(doctors: usize) -> Option<String> {
    match doctors {
        0 => None,
        1 => Some("1 dentist".to_string()),
        2 | 3 => Some("2-3 dentists".to_string()),
        _ => Some("4+ dentists".to_string()),
    }
}

/// Read phone, email, lead dentist and practice size off one HTML page.
pub fn contacts_from_html(html: &str) -> ContactDetails {
    let without_scripts = RE_SCRIPT_STYLE.replace_all(html, " ");
    let text = normalize_text(&without_scripts);

    let phone = RE_TEL
        .captures_iter(html)
        .filter_map(|c| c.get(1).and_then(|m| format_us_phone(m.as_str())))
        .next()
        .or_else(|| {
            RE_PHONE
                .captures(&text)
                .map(|c| format!("({}) {}-{}", &c[1], &c[2], &c[3]))
        });

    let email = RE_MAILTO
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .chain(RE_EMAIL.find_iter(&text).map(|m| m.as_str().to_string()))
        .filter(|e| RE_EMAIL.is_match(e) && plausible_email(e))
        .map(|e| e.to_ascii_lowercase())
        .next();

    let mut doctors: Vec<String> = Vec::new();
    for caps in RE_DOCTOR.captures_iter(&text) {
        let name = format!("Dr. {}", &caps[1]);
        if !doctors.contains(&name) {
            doctors.push(name);
        }
    }

    ContactDetails {
        phone,
        email,
        decision_maker: doctors.first().cloned(),
        size: size_label(doctors.len()),
    }
}

/// Keep `primary` values, fill blanks from `extra`.
fn fill_from(primary: ContactDetails, extra: ContactDetails) -> ContactDetails {
    ContactDetails {
        phone: primary.phone.or(extra.phone),
        email: primary.email.or(extra.email),
        decision_maker: primary.decision_maker.or(extra.decision_maker),
        size: primary.size.or(extra.size),
    }
}

pub struct WebResolver {
    client: reqwest::Client,
    search_url: String,
}

impl WebResolver {
    pub fn new(search_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::ingest::providers::job_feed::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building resolver http client")?;
        Ok(Self {
            client,
            search_url: search_url.to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var(ENV_SEARCH_URL).unwrap_or_else(|_| DEFAULT_SEARCH_URL.to_string());
        Self::new(&url)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("non-2xx from {url}"))?
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))
    }
}

#[async_trait]
impl Resolver for WebResolver {
    async fn find_website(
        &self,
        name: &str,
        city: Option<&str>,
        state: Option<&str>,
    ) -> Result<Option<String>> {
        let query = [Some(name), city, state, Some("dentist")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let html = self
            .client
            .get(&self.search_url)
            .query(&[("q", query.as_str())])
            .send()
            .await
            .context("search request")?
            .error_for_status()
            .context("search non-2xx")?
            .text()
            .await
            .context("search body")?;
        Ok(pick_website(&html, name))
    }

    async fn extract_contacts(&self, url: &str) -> Result<ContactDetails> {
        let home = contacts_from_html(&self.get_text(url).await?);
        if home.phone.is_some() || home.email.is_some() {
            return Ok(home);
        }

        // Contact pages are optional; a miss is not an error.
        let base = Url::parse(url).with_context(|| format!("bad website url {url}"))?;
        let mut merged = home;
        for path in ["contact-us", "contact"] {
            let Ok(page) = base.join(path) else { continue };
            match self.get_text(page.as_str()).await {
                Ok(html) => {
                    merged = fill_from(merged, contacts_from_html(&html));
                    if merged.phone.is_some() || merged.email.is_some() {
                        break;
                    }
                }
                Err(e) => tracing::debug!(target: "enrich", error = %e, "contact page miss"),
            }
        }
        Ok(merged)
    }
}
