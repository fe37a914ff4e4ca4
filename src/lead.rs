//! # Lead
//! The single record that flows through the whole pipeline.
//!
//! A source adapter creates it as a raw candidate, dedup/recency may drop it,
//! enrichment fills its contact gaps once, and validation decides whether it
//! can be surfaced to the operator.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A lead before enrichment. Same logical record, just earlier in its life.
pub type Candidate = Lead;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl Location {
    pub fn new(city: Option<&str>, state: Option<&str>, zip: Option<&str>) -> Self {
        Self {
            city: city.map(str::to_string),
            state: state.map(str::to_string),
            zip: zip.map(str::to_string),
        }
    }

    /// Non-empty parts joined as `"City, ST, 12345"`.
    pub fn display(&self) -> String {
        [&self.city, &self.state, &self.zip]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Job posting → practice lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub practice_name: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    /// Shown instead of `posted_at` when the source gave an unparseable date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    // enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_maker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practice_size: Option<String>,
}

/// What the contact extractor managed to find on a practice website.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub decision_maker: Option<String>,
    pub size: Option<String>,
}

impl ContactDetails {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.email.is_none()
            && self.decision_maker.is_none()
            && self.size.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeadError {
    #[error("practice name is empty")]
    EmptyName,
    #[error("{field} is not an http(s) url: {value}")]
    BadUrl { field: &'static str, value: String },
    #[error("malformed email: {0}")]
    BadEmail(String),
    #[error("phone must have 7-15 digits: {0}")]
    BadPhone(String),
    #[error("state must be a 2-letter code: {0}")]
    BadState(String),
}

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex")
});

impl Lead {
    pub fn new(practice_name: impl Into<String>, location: Location) -> Self {
        Self {
            practice_name: practice_name.into(),
            location,
            ..Default::default()
        }
    }

    /// `lower(practice_name)|city|state`. Missing parts collapse to empty strings.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.practice_name.to_lowercase(),
            self.location.city.as_deref().unwrap_or_default(),
            self.location.state.as_deref().unwrap_or_default()
        )
    }

    pub fn has_contact_channel(&self) -> bool {
        self.phone.is_some() || self.email.is_some()
    }

    /// Fill gaps from enrichment. Values already present on the record always win.
    pub fn merge_enrichment(mut self, website: Option<String>, contacts: ContactDetails) -> Self {
        self.website = self.website.or(website);
        self.phone = self.phone.or(contacts.phone);
        self.email = self.email.or(contacts.email);
        self.decision_maker_name = self.decision_maker_name.or(contacts.decision_maker);
        self.practice_size = self.practice_size.or(contacts.size);
        self
    }

    /// Schema check run on every merged record before it may leave the pool.
    pub fn validate(&self) -> Result<(), LeadError> {
        if self.practice_name.trim().is_empty() {
            return Err(LeadError::EmptyName);
        }
        check_url("website", self.website.as_deref())?;
        check_url("sourceUrl", self.source_url.as_deref())?;

        if let Some(email) = self.email.as_deref() {
            if !RE_EMAIL.is_match(email) {
                return Err(LeadError::BadEmail(email.to_string()));
            }
        }
        if let Some(phone) = self.phone.as_deref() {
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            if !(7..=15).contains(&digits) {
                return Err(LeadError::BadPhone(phone.to_string()));
            }
        }
        if let Some(state) = self.location.state.as_deref() {
            if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(LeadError::BadState(state.to_string()));
            }
        }
        Ok(())
    }
}

fn check_url(field: &'static str, value: Option<&str>) -> Result<(), LeadError> {
    let Some(v) = value else {
        return Ok(());
    };
    match reqwest::Url::parse(v) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => Ok(()),
        _ => Err(LeadError::BadUrl {
            field,
            value: v.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn austin(name: &str) -> Lead {
        Lead::new(name, Location::new(Some("Austin"), Some("TX"), None))
    }

    #[test]
    fn identity_key_is_case_insensitive_on_name_only() {
        let a = austin("Bright Smiles Dental");
        let b = austin("BRIGHT smiles dental");
        assert_eq!(a.identity_key(), b.identity_key());
        assert_eq!(a.identity_key(), "bright smiles dental|Austin|TX");

        let c = Lead::new("Bright Smiles Dental", Location::default());
        assert_eq!(c.identity_key(), "bright smiles dental||");
    }

    #[test]
    fn merge_keeps_existing_values() {
        let mut lead = austin("Bright Smiles Dental");
        lead.phone = Some("555-1234".into());

        let merged = lead.merge_enrichment(
            Some("https://brightsmiles.example/".into()),
            ContactDetails {
                phone: Some("(512) 555-9999".into()),
                email: Some("office@brightsmiles.example".into()),
                decision_maker: None,
                size: Some("1 dentist".into()),
            },
        );
        assert_eq!(merged.phone.as_deref(), Some("555-1234"));
        assert_eq!(merged.email.as_deref(), Some("office@brightsmiles.example"));
        assert_eq!(merged.website.as_deref(), Some("https://brightsmiles.example/"));
        assert_eq!(merged.practice_size.as_deref(), Some("1 dentist"));
        assert!(merged.decision_maker_name.is_none());
    }

    #[test]
    fn validate_rejects_bad_fields() {
        assert_eq!(austin("  ").validate(), Err(LeadError::EmptyName));

        let mut l = austin("Smile Co");
        l.email = Some("not-an-email".into());
        assert!(matches!(l.validate(), Err(LeadError::BadEmail(_))));

        let mut l = austin("Smile Co");
        l.website = Some("ftp://smile.example".into());
        assert!(matches!(l.validate(), Err(LeadError::BadUrl { field: "website", .. })));

        let mut l = austin("Smile Co");
        l.phone = Some("12".into());
        assert!(matches!(l.validate(), Err(LeadError::BadPhone(_))));

        let l = Lead::new("Smile Co", Location::new(Some("Austin"), Some("Texas"), None));
        assert!(matches!(l.validate(), Err(LeadError::BadState(_))));
    }

    #[test]
    fn validate_accepts_sparse_record() {
        assert!(Lead::new("Smile Co", Location::default()).validate().is_ok());
    }

    #[test]
    fn serializes_camel_case_and_skips_missing() {
        let mut l = austin("Smile Co");
        l.decision_maker_name = Some("Dr. Ana Ruiz".into());
        let v = serde_json::to_value(&l).unwrap();
        assert_eq!(v["practiceName"], "Smile Co");
        assert_eq!(v["decisionMakerName"], "Dr. Ana Ruiz");
        assert_eq!(v["location"]["city"], "Austin");
        assert!(v.get("phone").is_none());
    }

    #[test]
    fn location_display_skips_blank_parts() {
        let loc = Location::new(Some("Austin"), None, Some("78701"));
        assert_eq!(loc.display(), "Austin, 78701");
    }
}
