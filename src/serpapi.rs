//! SerpAPI Google Scholar Author engine client.
//!
//! Fetches the full publication list for a fixed author profile. This is the
//! source of truth for every run: any failure here is fatal and the run aborts
//! before the persisted file is touched.

use crate::error::{PubsyncError, Result};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, info};

/// SerpAPI search endpoint
const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Articles per page (SerpAPI maximum for the author engine)
const PAGE_SIZE: usize = 100;

/// One raw publication as reported by the author profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorArticle {
    pub title: String,
    pub authors: String,
    pub year: String,
    pub venue: String,
    pub citations: i64,
    pub link: String,
}

/// SerpAPI client for the `google_scholar_author` engine.
pub struct ScholarClient {
    client: reqwest::Client,
    api_key: String,
}

impl ScholarClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("pubsync/0.1")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PubsyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Fetch the complete article list for an author profile.
    ///
    /// Pages through the profile until a short page signals the end.
    pub async fn fetch_author(&self, author_id: &str) -> Result<Vec<AuthorArticle>> {
        let mut all = Vec::new();
        let mut start = 0usize;

        loop {
            let page = self.fetch_page(author_id, start).await?;
            let count = page.len();
            debug!(start = start, count = count, "Fetched author page");
            all.extend(page);
            if count < PAGE_SIZE {
                break;
            }
            start += PAGE_SIZE;
        }

        info!(author_id = author_id, total = all.len(), "Author fetch complete");
        Ok(all)
    }

    async fn fetch_page(&self, author_id: &str, start: usize) -> Result<Vec<AuthorArticle>> {
        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[
                ("engine", "google_scholar_author"),
                ("author_id", author_id),
                ("api_key", &self.api_key),
                ("start", &start.to_string()),
                ("num", &PAGE_SIZE.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PubsyncError::Api {
                code: response.status().as_u16() as i32,
                message: format!("SerpAPI error: {}", response.status()),
            });
        }

        let data: AuthorResponse = response
            .json()
            .await
            .map_err(|e| PubsyncError::Parse(format!("Unexpected SerpAPI response: {}", e)))?;

        Ok(data.articles.into_iter().map(AuthorArticle::from).collect())
    }
}

/// Deserialize a field the source reports inconsistently as string or number.
pub(crate) fn de_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::String(s)) => s,
        Some(StringOrNumber::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

// === SerpAPI Response Types ===

// `articles` is deliberately not defaulted: a response without it means the
// engine returned something other than an author profile, which aborts the run.
#[derive(Debug, Deserialize)]
struct AuthorResponse {
    articles: Vec<SerpArticle>,
}

#[derive(Debug, Deserialize)]
struct SerpArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    year: String,
    #[serde(default)]
    publication: String,
    #[serde(default)]
    cited_by: Option<SerpCitedBy>,
    #[serde(default)]
    link: String,
}

#[derive(Debug, Deserialize)]
struct SerpCitedBy {
    #[serde(default)]
    value: Option<i64>,
}

impl From<SerpArticle> for AuthorArticle {
    fn from(raw: SerpArticle) -> Self {
        Self {
            title: raw.title,
            authors: raw.authors,
            year: raw.year,
            venue: raw.publication,
            citations: raw.cited_by.and_then(|c| c.value).unwrap_or(0),
            link: raw.link,
        }
    }
}
