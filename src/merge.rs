//! Enrichment and merge engine.
//!
//! The heart of pubsync: a pure function from (freshly fetched articles,
//! previously persisted records) to the next persisted record set. Fetched
//! fields always win; locally curated `doi` and `pdf` values are sticky and
//! survive every run until the fetch is the one to blink.
//!
//! Records are keyed by a normalized form of the title (case-folded, stripped
//! of punctuation) so cosmetic changes upstream do not orphan curated fields.
//! The original display title is persisted untouched.

use crate::crossref::{first_author, DoiResolver};
use crate::serpapi::{de_string_or_number, AuthorArticle};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::info;

/// One publication as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub year: String,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub pages: String,
    #[serde(default)]
    pub citations: i64,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub pdf: String,
}

/// Canonical on-disk form for DOIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoiForm {
    /// Bare identifier, e.g. `10.1234/abc`
    Bare,
    /// Resolver URL, e.g. `https://doi.org/10.1234/abc`
    #[default]
    Url,
}

fn title_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// Lookup key for a title: case-folded, non-alphanumerics stripped.
pub fn normalize_title(title: &str) -> String {
    title_key_regex()
        .replace_all(&title.to_lowercase(), "")
        .into_owned()
}

/// Index records by normalized title. Later entries win on collision.
pub fn index_by_title(records: Vec<PublicationRecord>) -> HashMap<String, PublicationRecord> {
    records
        .into_iter()
        .map(|r| (normalize_title(&r.title), r))
        .collect()
}

/// Render a DOI in the chosen canonical form.
///
/// Accepts bare identifiers, `doi:` prefixes, and any historical mix of
/// doi.org / dx.doi.org URLs. Re-canonicalizing canonical input is a no-op.
pub fn canonicalize_doi(raw: &str, form: DoiForm) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_lowercase();
    let prefixes = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ];
    let bare = prefixes
        .iter()
        .find(|p| lower.starts_with(*p))
        .map(|p| &trimmed[p.len()..])
        .unwrap_or(trimmed);

    match form {
        DoiForm::Bare => bare.to_string(),
        DoiForm::Url => format!("https://doi.org/{}", bare),
    }
}

/// Deterministic placeholder path for a publication's PDF.
///
/// Stable across runs for the same title, so a manually supplied path written
/// over the placeholder is never clobbered later.
pub fn placeholder_pdf(title: &str) -> String {
    let safe = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect::<String>()
        .trim()
        .replace(' ', "_");
    format!("papers/{}.pdf", safe)
}

/// Merge freshly fetched articles with the previously persisted set.
///
/// Output order follows fetch order. Titles present only in `previous` are
/// dropped. `doi` and `pdf` are reused verbatim when the previous record has
/// them; a missing DOI triggers one resolver call, a missing PDF gets the
/// deterministic placeholder.
pub async fn merge<R: DoiResolver>(
    fetched: &[AuthorArticle],
    previous: &HashMap<String, PublicationRecord>,
    resolver: &R,
    doi_form: DoiForm,
) -> Vec<PublicationRecord> {
    let mut out: Vec<PublicationRecord> = Vec::with_capacity(fetched.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for article in fetched {
        let key = normalize_title(&article.title);

        // Previous run's DOI, or one already resolved earlier in this run
        // when the fetch repeats a title.
        let cached_doi = previous
            .get(&key)
            .map(|p| p.doi.clone())
            .filter(|d| !d.is_empty())
            .or_else(|| {
                slots
                    .get(&key)
                    .map(|&i| out[i].doi.clone())
                    .filter(|d| !d.is_empty())
            });

        let doi = match cached_doi {
            Some(cached) => {
                info!(title = %article.title, "DOI cached");
                cached
            }
            None => {
                match resolver
                    .resolve(&article.title, first_author(&article.authors), &article.year)
                    .await
                {
                    Some(found) => {
                        let doi = canonicalize_doi(&found, doi_form);
                        info!(title = %article.title, doi = %doi, "DOI resolved");
                        doi
                    }
                    None => {
                        info!(title = %article.title, "DOI not found");
                        String::new()
                    }
                }
            }
        };

        let pdf = previous
            .get(&key)
            .map(|p| p.pdf.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| placeholder_pdf(&article.title));

        let record = PublicationRecord {
            title: article.title.clone(),
            authors: article.authors.clone(),
            year: article.year.clone(),
            journal: article.venue.clone(),
            pages: String::new(),
            citations: article.citations.max(0),
            doi,
            pdf,
        };

        match slots.get(&key) {
            // Repeated title in one fetch: last write wins, position of the
            // first occurrence is kept so output order stays deterministic.
            Some(&idx) => out[idx] = record,
            None => {
                slots.insert(key, out.len());
                out.push(record);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Zero-delay resolver backed by a fixed map, counting calls.
    struct FakeResolver {
        known: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl FakeResolver {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                known: entries
                    .iter()
                    .map(|(t, d)| (t.to_string(), d.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn empty() -> Self {
            Self::new(&[])
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DoiResolver for FakeResolver {
        async fn resolve(&self, title: &str, _author: &str, _year: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.known.get(title).cloned()
        }
    }

    fn article(title: &str, year: &str) -> AuthorArticle {
        AuthorArticle {
            title: title.to_string(),
            authors: "J Doe, A Smith".to_string(),
            year: year.to_string(),
            venue: "Nature".to_string(),
            citations: 10,
            link: "https://example.com".to_string(),
        }
    }

    fn record(title: &str, doi: &str, pdf: &str) -> PublicationRecord {
        PublicationRecord {
            title: title.to_string(),
            doi: doi.to_string(),
            pdf: pdf.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cached_doi_is_preserved_without_resolver_call() {
        let previous = index_by_title(vec![record("Paper A", "10.1/x", "papers/Paper_A.pdf")]);
        let resolver = FakeResolver::empty();

        let merged = merge(
            &[article("Paper A", "2024")],
            &previous,
            &resolver,
            DoiForm::Url,
        )
        .await;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].doi, "10.1/x");
        assert_eq!(merged[0].pdf, "papers/Paper_A.pdf");
        assert_eq!(merged[0].year, "2024");
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_titles_are_dropped() {
        let previous = index_by_title(vec![
            record("Kept Paper", "10.1/kept", ""),
            record("Gone Paper", "10.1/gone", ""),
        ]);
        let resolver = FakeResolver::empty();

        let merged = merge(
            &[article("Kept Paper", "2020")],
            &previous,
            &resolver,
            DoiForm::Url,
        )
        .await;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Kept Paper");
    }

    #[tokio::test]
    async fn test_unresolved_doi_is_empty_with_placeholder_pdf() {
        let resolver = FakeResolver::empty();

        let merged = merge(
            &[article("Brand New Paper", "2025")],
            &HashMap::new(),
            &resolver,
            DoiForm::Url,
        )
        .await;

        assert_eq!(merged[0].doi, "");
        assert_eq!(merged[0].pdf, "papers/Brand_New_Paper.pdf");
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resolved_doi_is_canonicalized() {
        let resolver = FakeResolver::new(&[("Paper A", "10.1234/abc")]);

        let merged = merge(
            &[article("Paper A", "2024")],
            &HashMap::new(),
            &resolver,
            DoiForm::Url,
        )
        .await;
        assert_eq!(merged[0].doi, "https://doi.org/10.1234/abc");

        let resolver = FakeResolver::new(&[("Paper A", "https://doi.org/10.1234/abc")]);
        let merged = merge(
            &[article("Paper A", "2024")],
            &HashMap::new(),
            &resolver,
            DoiForm::Bare,
        )
        .await;
        assert_eq!(merged[0].doi, "10.1234/abc");
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let fetched = vec![article("Paper A", "2024"), article("Paper B", "2023")];
        let resolver = FakeResolver::new(&[("Paper A", "10.1/a"), ("Paper B", "10.1/b")]);

        let first = merge(&fetched, &HashMap::new(), &resolver, DoiForm::Url).await;
        assert_eq!(resolver.call_count(), 2);

        let second = merge(
            &fetched,
            &index_by_title(first.clone()),
            &resolver,
            DoiForm::Url,
        )
        .await;

        assert_eq!(first, second);
        // No resolver traffic for already-resolved titles
        assert_eq!(resolver.call_count(), 2);
    }

    #[tokio::test]
    async fn test_title_matching_survives_punctuation_and_case() {
        let previous = index_by_title(vec![record("A Study: of Things!", "10.1/x", "manual.pdf")]);
        let resolver = FakeResolver::empty();

        let merged = merge(
            &[article("a study of things", "2024")],
            &previous,
            &resolver,
            DoiForm::Url,
        )
        .await;

        assert_eq!(merged[0].doi, "10.1/x");
        assert_eq!(merged[0].pdf, "manual.pdf");
        // Display title comes from the fetch, not the old record
        assert_eq!(merged[0].title, "a study of things");
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_fetched_titles_last_write_wins_in_place() {
        let fetched = vec![
            article("Paper A", "2023"),
            article("Paper B", "2020"),
            article("Paper A", "2024"),
        ];
        let resolver = FakeResolver::new(&[("Paper A", "10.1/a")]);

        let merged = merge(&fetched, &HashMap::new(), &resolver, DoiForm::Bare).await;

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "Paper A");
        assert_eq!(merged[0].year, "2024");
        assert_eq!(merged[1].title, "Paper B");
        // Second occurrence reuses the in-run resolution
        assert_eq!(
            resolver.call_count(),
            2,
            "one call for Paper A, one for Paper B"
        );
        assert_eq!(merged[0].doi, "10.1/a");
    }

    #[test]
    fn test_canonicalize_doi_is_idempotent() {
        for raw in [
            "10.1234/abc",
            "doi:10.1234/abc",
            "https://doi.org/10.1234/abc",
            "http://dx.doi.org/10.1234/abc",
        ] {
            assert_eq!(canonicalize_doi(raw, DoiForm::Bare), "10.1234/abc");
            assert_eq!(
                canonicalize_doi(raw, DoiForm::Url),
                "https://doi.org/10.1234/abc"
            );
        }
        let canonical = canonicalize_doi("10.1234/abc", DoiForm::Url);
        assert_eq!(canonicalize_doi(&canonical, DoiForm::Url), canonical);
        assert_eq!(canonicalize_doi("", DoiForm::Url), "");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("A Study: of Things!"), "astudyofthings");
        assert_eq!(normalize_title("a study of things"), "astudyofthings");
    }

    #[test]
    fn test_placeholder_pdf_is_stable() {
        assert_eq!(placeholder_pdf("Paper A"), "papers/Paper_A.pdf");
        assert_eq!(
            placeholder_pdf("Graphs: Theory & Practice"),
            "papers/Graphs_Theory__Practice.pdf"
        );
        assert_eq!(placeholder_pdf("Paper A"), placeholder_pdf("Paper A"));
    }
}
