//! Persisted publication list.
//!
//! One JSON array of records, pretty-printed, rewritten whole at the end of a
//! successful run. A missing or unparsable file is never fatal: the run just
//! proceeds from an empty previous set and re-derives what it can.

use crate::error::Result;
use crate::merge::{canonicalize_doi, DoiForm, PublicationRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loads and saves the publication list at a fixed path.
pub struct PublicationStore {
    path: PathBuf,
}

impl PublicationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous record set.
    ///
    /// Missing file or malformed JSON yields an empty set. DOIs are
    /// re-canonicalized on load so mixed historical forms do not drift.
    pub fn load(&self, doi_form: DoiForm) -> Vec<PublicationRecord> {
        if !self.path.exists() {
            debug!("Publication file not found: {:?}", self.path);
            return Vec::new();
        }

        let records = match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<PublicationRecord>>(&content) {
                Ok(records) => {
                    info!(
                        "Loaded {} publications from {:?}",
                        records.len(),
                        self.path
                    );
                    records
                }
                Err(e) => {
                    warn!("Failed to parse publication file, starting fresh: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read publication file, starting fresh: {}", e);
                Vec::new()
            }
        };

        records
            .into_iter()
            .map(|mut r| {
                r.doi = canonicalize_doi(&r.doi, doi_form);
                r
            })
            .collect()
    }

    /// Atomically rewrite the publication list.
    ///
    /// Writes to a sibling temp file then renames over the target, so a crash
    /// mid-write never leaves a truncated list behind.
    pub fn save(&self, records: &[PublicationRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        info!("Saved {} publications to {:?}", records.len(), self.path);
        Ok(())
    }
}
