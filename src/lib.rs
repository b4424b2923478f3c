//! # pubsync
//!
//! Keeps an author's publication list in sync: fetch the profile from the
//! SerpAPI Google Scholar Author engine, enrich missing DOIs via Crossref,
//! merge with the previously saved JSON list so curated fields survive, and
//! rewrite the list atomically.
//!
//! ## Modules
//!
//! - [`serpapi`] - Google Scholar author profile fetch (SerpAPI)
//! - [`crossref`] - DOI resolution via the Crossref API
//! - [`merge`] - The enrichment and merge engine
//! - [`store`] - Persisted JSON publication list
//! - [`pacing`] - Fixed-interval pacing for resolver calls
//! - [`error`] - Custom error types

pub mod crossref;
pub mod error;
pub mod merge;
pub mod pacing;
pub mod serpapi;
pub mod store;

pub use error::{PubsyncError, Result};
