//! Crossref API client for DOI resolution.
//!
//! Maps a citation (title, optionally first author and year) to its best
//! matching DOI. Lookups are paced through a shared [`RateGate`] and every
//! failure mode short of a bug is treated as "no identifier found" so one bad
//! record never aborts a run.

use crate::error::{PubsyncError, Result};
use crate::pacing::RateGate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Crossref API base URL
const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// Polite pool email for Crossref API
const MAILTO: &str = "pubsync@example.com";

/// A source of DOIs for citations. The merge engine is generic over this so
/// tests can substitute a zero-delay fake.
#[allow(async_fn_in_trait)]
pub trait DoiResolver {
    /// Resolve a citation to a bare DOI, or `None` when nothing matches.
    async fn resolve(&self, title: &str, first_author: &str, year: &str) -> Option<String>;
}

/// Crossref-backed resolver with fixed-interval pacing.
pub struct CrossrefClient {
    client: reqwest::Client,
    gate: RateGate,
}

impl CrossrefClient {
    /// Create a new client. `delay` is the minimum spacing between requests.
    pub fn new(delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("pubsync/0.1 (mailto:{})", MAILTO))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PubsyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            gate: RateGate::new(delay),
        })
    }

    async fn do_query(&self, query: &[(&str, &str)]) -> Result<Option<String>> {
        self.gate.wait().await;

        let response = self
            .client
            .get(CROSSREF_API_URL)
            .query(query)
            .query(&[("rows", "1"), ("select", "DOI,title"), ("mailto", MAILTO)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PubsyncError::RateLimited(5));
        }

        if !response.status().is_success() {
            return Err(PubsyncError::Api {
                code: response.status().as_u16() as i32,
                message: format!("Crossref API error: {}", response.status()),
            });
        }

        let data: CrossrefResponse = response.json().await?;

        Ok(data
            .message
            .items
            .into_iter()
            .next()
            .map(|item| item.doi)
            .filter(|doi| !doi.is_empty()))
    }
}

impl DoiResolver for CrossrefClient {
    async fn resolve(&self, title: &str, first_author: &str, year: &str) -> Option<String> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }

        // Combined query first, title-only as fallback.
        let bibliographic = [title, first_author.trim(), year.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        let attempts: [&[(&str, &str)]; 2] = [
            &[("query.bibliographic", bibliographic.as_str())],
            &[("query.title", title)],
        ];

        for query in attempts {
            match self.do_query(query).await {
                Ok(Some(doi)) => {
                    debug!(title = %title, doi = %doi, "DOI resolved");
                    return Some(doi);
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        title = %title,
                        error = %e,
                        "Crossref lookup failed, treating as not found"
                    );
                    return None;
                }
            }
        }

        None
    }
}

/// First author from a free-form comma-separated author string.
pub fn first_author(authors: &str) -> &str {
    authors.split(',').next().unwrap_or("").trim()
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

#[derive(Debug, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<CrossrefItem>,
}

#[derive(Debug, Deserialize)]
struct CrossrefItem {
    #[serde(rename = "DOI", default)]
    doi: String,
}
