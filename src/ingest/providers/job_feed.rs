// src/ingest/providers/job_feed.rs
//! RSS job feed adapter.
//!
//! Feed URLs are templates with `{days}` and `{page}` placeholders. Pages are
//! read in order starting at 1 and reading stops at the first empty page or at
//! `max_pages`, whichever comes first.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::config::FeedSpec;
use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::lead::{Candidate, Lead, Location};

pub const USER_AGENT: &str = "lead-harvester/0.1";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    // Job boards commonly add these next to the standard RSS fields.
    company: Option<String>,
    city: Option<String>,
    state: Option<String>,
    #[serde(alias = "postalcode")]
    zip: Option<String>,
}

static RE_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Za-z.'\-]*(?:\s+[A-Z][A-Za-z.'\-]*)*),\s*([A-Za-z]{2})\b(?:\s+(\d{5}))?")
        .expect("location regex")
});

const US_STATES: &[(&str, &str)] = &[
    ("alabama", "AL"), ("alaska", "AK"), ("arizona", "AZ"), ("arkansas", "AR"),
    ("california", "CA"), ("colorado", "CO"), ("connecticut", "CT"), ("delaware", "DE"),
    ("district of columbia", "DC"), ("florida", "FL"), ("georgia", "GA"), ("hawaii", "HI"),
    ("idaho", "ID"), ("illinois", "IL"), ("indiana", "IN"), ("iowa", "IA"),
    ("kansas", "KS"), ("kentucky", "KY"), ("louisiana", "LA"), ("maine", "ME"),
    ("maryland", "MD"), ("massachusetts", "MA"), ("michigan", "MI"), ("minnesota", "MN"),
    ("mississippi", "MS"), ("missouri", "MO"), ("montana", "MT"), ("nebraska", "NE"),
    ("nevada", "NV"), ("new hampshire", "NH"), ("new jersey", "NJ"), ("new mexico", "NM"),
    ("new york", "NY"), ("north carolina", "NC"), ("north dakota", "ND"), ("ohio", "OH"),
    ("oklahoma", "OK"), ("oregon", "OR"), ("pennsylvania", "PA"), ("rhode island", "RI"),
    ("south carolina", "SC"), ("south dakota", "SD"), ("tennessee", "TN"), ("texas", "TX"),
    ("utah", "UT"), ("vermont", "VT"), ("virginia", "VA"), ("washington", "WA"),
    ("west virginia", "WV"), ("wisconsin", "WI"), ("wyoming", "WY"),
];

/// Two-letter code for `"TX"`, `"tx"` or `"Texas"`. Anything else is `None`.
pub fn state_code(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_end_matches('.');
    if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(raw.to_ascii_uppercase());
    }
    let lower = raw.to_ascii_lowercase();
    US_STATES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, code)| code.to_string())
}

/// Absolute http(s) posting link. Relative links are joined onto `base`
/// when there is one, otherwise dropped.
fn absolute_link(link: &str, base: Option<&Url>) -> Option<String> {
    let url = match Url::parse(link) {
        Ok(u) => u,
        Err(_) => base?.join(link).ok()?,
    };
    (matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .then(|| url.to_string())
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(odt.unix_timestamp(), 0)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| normalize_text(&v)).filter(|v| !v.is_empty())
}

/// Split a posting title into (practice, location part).
///
/// Understands `"<role> - <practice> - <location>"`, `"<role> at <practice>"`
/// and `"<role> at <practice> - <location>"`.
pub fn split_title(title: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = title.split(" - ").map(str::trim).collect();
    if parts.len() >= 3 {
        return (Some(parts[1].to_string()), Some(parts[2..].join(" - ")));
    }
    if let Some((_, after)) = title.rsplit_once(" at ") {
        return match after.split_once(" - ") {
            Some((practice, loc)) => (Some(practice.trim().to_string()), Some(loc.trim().to_string())),
            None => (Some(after.trim().to_string()), None),
        };
    }
    if parts.len() == 2 {
        return (Some(parts[1].to_string()), None);
    }
    (None, None)
}

/// First `City, ST[ 12345]` in `text`.
pub fn parse_location(text: &str) -> Option<Location> {
    let caps = RE_LOCATION.captures(text)?;
    Some(Location {
        city: caps.get(1).map(|m| m.as_str().trim().to_string()),
        state: caps.get(2).map(|m| m.as_str().to_ascii_uppercase()),
        zip: caps.get(3).map(|m| m.as_str().to_string()),
    })
}

fn item_to_candidate(it: Item, base: Option<&Url>) -> Option<Candidate> {
    let title = non_empty(it.title).unwrap_or_default();
    let description = non_empty(it.description).unwrap_or_default();
    let (title_practice, title_loc) = split_title(&title);

    let practice = non_empty(it.company).or(title_practice)?;
    if practice.is_empty() {
        return None;
    }

    let explicit = Location {
        city: non_empty(it.city),
        state: non_empty(it.state).and_then(|s| state_code(&s)),
        zip: non_empty(it.zip),
    };
    let location = if explicit != Location::default() {
        explicit
    } else {
        title_loc
            .as_deref()
            .and_then(parse_location)
            .or_else(|| parse_location(&description))
            .unwrap_or_default()
    };

    let raw_date = non_empty(it.pub_date);
    let posted_at = raw_date.as_deref().and_then(parse_rfc2822);
    let posted_at_text = if posted_at.is_none() { raw_date } else { None };

    let mut lead = Lead::new(practice, location);
    lead.posted_at = posted_at;
    lead.posted_at_text = posted_at_text;
    lead.source_url = non_empty(it.link).and_then(|l| absolute_link(&l, base));
    Some(lead)
}

enum Mode {
    Fixture(Vec<String>),
    Http {
        url_template: String,
        client: reqwest::Client,
    },
}

pub struct JobFeedProvider {
    name: String,
    mode: Mode,
}

impl JobFeedProvider {
    /// Pre-recorded feed pages; page N is `pages[N - 1]`.
    pub fn from_fixture_pages(name: &str, pages: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(pages),
        }
    }

    pub fn from_spec(spec: &FeedSpec, client: reqwest::Client) -> Self {
        Self {
            name: spec.name.clone(),
            mode: Mode::Http {
                url_template: spec.url.clone(),
                client,
            },
        }
    }

    pub fn page_url(template: &str, days: u32, page: u32) -> String {
        template
            .replace("{days}", &days.to_string())
            .replace("{page}", &page.to_string())
    }

    /// Parse one RSS page into candidates. Items without a practice name are skipped.
    /// Relative `<link>`s are resolved against `page_url`, or dropped without one.
    pub fn parse_page(&self, xml: &str, page_url: Option<&str>) -> Result<Vec<Candidate>> {
        let t0 = std::time::Instant::now();
        let rss: Rss = from_str(xml).with_context(|| format!("parsing {} feed xml", self.name))?;
        let base = page_url.and_then(|u| Url::parse(u).ok());

        let out: Vec<Candidate> = rss
            .channel
            .item
            .into_iter()
            .filter_map(|it| item_to_candidate(it, base.as_ref()))
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("leads_feed_parse_ms").record(ms);
        counter!("leads_feed_items_total").increment(out.len() as u64);
        Ok(out)
    }

    /// Page body and the URL it came from (fixtures have none).
    async fn fetch_page(&self, days: u32, page: u32) -> Result<Option<(String, Option<String>)>> {
        match &self.mode {
            Mode::Fixture(pages) => Ok(pages.get(page as usize - 1).map(|p| (p.clone(), None))),
            Mode::Http {
                url_template,
                client,
            } => {
                let url = Self::page_url(url_template, days, page);
                let body = client
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("{} http get page {page}", self.name))?
                    .error_for_status()
                    .with_context(|| format!("{} non-2xx on page {page}", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                Ok(Some((body, Some(url))))
            }
        }
    }
}

/// Shared HTTP client settings for feeds.
pub fn feed_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(20))
        .build()
        .context("building feed http client")
}

#[async_trait]
impl SourceProvider for JobFeedProvider {
    async fn fetch_candidates(&self, days: u32, max_pages: u32) -> Result<Vec<Candidate>> {
        let mut out = Vec::new();
        for page in 1..=max_pages.max(1) {
            let Some((body, url)) = self.fetch_page(days, page).await? else {
                break;
            };
            let items = self.parse_page(&body, url.as_deref())?;
            if items.is_empty() {
                break;
            }
            out.extend(items);
        }
        tracing::debug!(target: "ingest", source = %self.name, count = out.len(), "feed read");
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_shapes() {
        assert_eq!(
            split_title("Dental Receptionist - Bright Smiles Dental - Austin, TX 78701"),
            (
                Some("Bright Smiles Dental".into()),
                Some("Austin, TX 78701".into())
            )
        );
        assert_eq!(
            split_title("Front Desk Coordinator at Lakeside Family Dentistry"),
            (Some("Lakeside Family Dentistry".into()), None)
        );
        assert_eq!(
            split_title("Receptionist at Oak Dental - Denver, CO"),
            (Some("Oak Dental".into()), Some("Denver, CO".into()))
        );
        assert_eq!(split_title("Receptionist"), (None, None));
    }

    #[test]
    fn location_pattern() {
        let loc = parse_location("Austin, TX 78701").unwrap();
        assert_eq!(loc, Location::new(Some("Austin"), Some("TX"), Some("78701")));
        let loc = parse_location("Apply in San Antonio, tx today").unwrap();
        assert_eq!(loc.city.as_deref(), Some("San Antonio"));
        assert_eq!(loc.state.as_deref(), Some("TX"));
        assert!(loc.zip.is_none());
    }

    #[test]
    fn page_url_fills_placeholders() {
        assert_eq!(
            JobFeedProvider::page_url("https://f.example/?d={days}&p={page}", 2, 3),
            "https://f.example/?d=2&p=3"
        );
    }

    #[test]
    fn state_names_map_to_codes() {
        assert_eq!(state_code("tx").as_deref(), Some("TX"));
        assert_eq!(state_code("Texas").as_deref(), Some("TX"));
        assert_eq!(state_code(" new york ").as_deref(), Some("NY"));
        assert_eq!(state_code("Tex."), None);
        assert_eq!(state_code("Ontario"), None);
    }

    #[test]
    fn links_are_made_absolute() {
        let base = Url::parse("https://jobs.example/rss?page=1").unwrap();
        assert_eq!(
            absolute_link("/view/2", Some(&base)).as_deref(),
            Some("https://jobs.example/view/2")
        );
        assert_eq!(absolute_link("/view/2", None), None);
        assert_eq!(absolute_link("mailto:hr@x.example", Some(&base)), None);
        assert_eq!(
            absolute_link("https://other.example/a", None).as_deref(),
            Some("https://other.example/a")
        );
    }

    #[test]
    fn rfc2822_dates() {
        let t = parse_rfc2822("Mon, 19 Oct 2026 08:30:00 +0000").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-10-19T08:30:00+00:00");
        assert!(parse_rfc2822("yesterday").is_none());
    }
}
