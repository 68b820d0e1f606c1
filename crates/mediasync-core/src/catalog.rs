//! Catalog interface: where the list of purchased items comes from.
//!
//! The engine only depends on resolved `DownloadItem`s. Talking to the store,
//! authenticating and resolving per-format URLs is the job of a
//! `CatalogClient`; the bundled one reads a JSON manifest produced by such a
//! client.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::job::DownloadItem;

/// One catalog record: the item plus metadata used only for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub item: DownloadItem,
    /// Purchase time, RFC 3339.
    #[serde(default)]
    pub purchased: Option<DateTime<Utc>>,
    /// Hidden from the collection by the owner.
    #[serde(default)]
    pub hidden: bool,
}

/// Source of catalog entries.
pub trait CatalogClient {
    fn entries(&self) -> anyhow::Result<Vec<CatalogEntry>>;
}

/// Catalog backed by a JSON array of entries on disk.
#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    path: PathBuf,
}

impl ManifestCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogClient for ManifestCatalog {
    fn entries(&self) -> anyhow::Result<Vec<CatalogEntry>> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("reading manifest {}", self.path.display()))?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&data)
            .with_context(|| format!("parsing manifest {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), count = entries.len(), "manifest loaded");
        Ok(entries)
    }
}

/// Which catalog entries to sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub include_hidden: bool,
    /// Drop entries purchased before this date. Entries without a purchase
    /// date are always kept.
    pub since: Option<NaiveDate>,
}

impl EntryFilter {
    pub fn accepts(&self, entry: &CatalogEntry) -> bool {
        if entry.hidden && !self.include_hidden {
            return false;
        }
        match (self.since, entry.purchased) {
            (Some(since), Some(purchased)) => purchased.date_naive() >= since,
            _ => true,
        }
    }

    /// Keep accepted entries, in order, as download items.
    pub fn apply(&self, entries: Vec<CatalogEntry>) -> Vec<DownloadItem> {
        let total = entries.len();
        let items: Vec<DownloadItem> = entries
            .into_iter()
            .filter(|e| self.accepts(e))
            .map(|e| e.item)
            .collect();
        if items.len() != total {
            tracing::info!(kept = items.len(), dropped = total - items.len(), "catalog filtered");
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"[
        {"artist":"A","title":"One","item_id":"1","url":"https://x/1.zip",
         "expected_size":100,"is_archive":true,"purchased":"2020-05-01T10:00:00Z"},
        {"artist":"B","title":"Two","item_id":"2","url":"https://x/2.mp3",
         "hidden":true,"purchased":"2023-01-01T00:00:00Z"},
        {"artist":"C","title":"Three","item_id":"3","url":"https://x/3.mp3"}
    ]"#;

    fn load() -> Vec<CatalogEntry> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, MANIFEST).unwrap();
        ManifestCatalog::new(&path).entries().unwrap()
    }

    #[test]
    fn manifest_parses_flattened_items() {
        let entries = load();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].item.expected_size, Some(100));
        assert!(entries[0].item.is_archive);
        assert!(entries[1].hidden);
        assert!(entries[2].purchased.is_none());
    }

    #[test]
    fn missing_manifest_is_an_error_with_path() {
        let err = ManifestCatalog::new("/nonexistent/manifest.json")
            .entries()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/manifest.json"));
    }

    #[test]
    fn default_filter_drops_hidden() {
        let items = EntryFilter::default().apply(load());
        let ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn since_filter_keeps_undated_entries() {
        let filter = EntryFilter {
            include_hidden: true,
            since: NaiveDate::from_ymd_opt(2021, 1, 1),
        };
        let items = filter.apply(load());
        let ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn since_is_inclusive() {
        let entries = load();
        let filter = EntryFilter {
            include_hidden: false,
            since: NaiveDate::from_ymd_opt(2020, 5, 1),
        };
        assert!(filter.accepts(&entries[0]));
    }
}
