// src/enrich/types.rs
use anyhow::Result;

use crate::lead::ContactDetails;

/// Website discovery + contact extraction for a practice.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    /// Best guess of the practice's own website, if any.
    async fn find_website(
        &self,
        name: &str,
        city: Option<&str>,
        state: Option<&str>,
    ) -> Result<Option<String>>;

    /// Whatever contact details can be read off `url`.
    async fn extract_contacts(&self, url: &str) -> Result<ContactDetails>;
}
