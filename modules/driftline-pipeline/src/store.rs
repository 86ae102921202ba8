//! In-memory item store fed by the scheduler. Owns a [`DedupIndex`] so
//! every admitted item is checked against, then added to, the same index.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use driftline_common::{AddResult, DiscoveredItem, DriftlineError};

use crate::dedup::DedupIndex;
use crate::scheduling::ItemSink;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, DiscoveredItem>,
    index: DedupIndex,
}

#[derive(Default)]
pub struct ItemStore {
    inner: Mutex<Inner>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch of items. Items without a URL, exact-URL duplicates,
    /// and near-duplicates are skipped; everything else is indexed and
    /// stored. Items missing an id get one derived from their URL so
    /// re-deliveries of the same item are stable.
    pub fn add(&self, items: Vec<DiscoveredItem>) -> Result<AddResult, DriftlineError> {
        let mut inner = self.inner.lock().unwrap();
        let mut result = AddResult::default();

        for mut item in items {
            if item.url.trim().is_empty() {
                result.skipped += 1;
                continue;
            }
            if inner.items.values().any(|existing| existing.url == item.url) {
                result.skipped += 1;
                continue;
            }
            let check = inner.index.check(&item)?;
            if check.is_duplicate {
                debug!(
                    url = %item.url,
                    original = ?check.original_id,
                    "Near-duplicate skipped"
                );
                result.skipped += 1;
                continue;
            }

            if item.id.trim().is_empty() {
                item.id = url_id(&item.url);
            }
            let id = item.id.clone();
            inner.index.index(&item, &id)?;
            inner.items.insert(id, item);
            result.added += 1;
        }

        Ok(result)
    }

    pub fn get_by_id(&self, id: &str) -> Option<DiscoveredItem> {
        self.inner.lock().unwrap().items.get(id).cloned()
    }

    /// Items published within `[from, to]` inclusive, newest first. An
    /// inverted range yields nothing.
    pub fn get_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<DiscoveredItem> {
        if from > to {
            return Vec::new();
        }
        let inner = self.inner.lock().unwrap();
        let mut hits: Vec<DiscoveredItem> = inner
            .items
            .values()
            .filter(|i| i.published_at >= from && i.published_at <= to)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        hits
    }

    /// Case-insensitive substring search over title and snippet. A blank
    /// query matches nothing.
    pub fn search(&self, query: &str) -> Vec<DiscoveredItem> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let inner = self.inner.lock().unwrap();
        let mut hits: Vec<DiscoveredItem> = inner
            .items
            .values()
            .filter(|i| {
                i.title.to_lowercase().contains(&needle)
                    || i.snippet.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        hits
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock().unwrap();
        StoreStats {
            count: inner.items.len(),
            oldest: inner.items.values().map(|i| i.published_at).min(),
            newest: inner.items.values().map(|i| i.published_at).max(),
        }
    }

    /// Evict items (and their dedup signals) older than the window.
    pub fn prune(&self, max_age_days: i64) -> Result<(), DriftlineError> {
        let mut inner = self.inner.lock().unwrap();
        inner.index.prune(max_age_days)?;
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        inner.items.retain(|_, i| i.published_at >= cutoff);
        Ok(())
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.clear();
        inner.index.clear();
    }
}

#[async_trait]
impl ItemSink for ItemStore {
    async fn deliver(&self, items: Vec<DiscoveredItem>) -> Result<AddResult> {
        Ok(self.add(items)?)
    }
}

/// Deterministic id from a URL, DJB2 over the bytes.
fn url_id(url: &str) -> String {
    let mut hash: u32 = 5381;
    for b in url.bytes() {
        hash = hash.wrapping_mul(33) ^ u32::from(b);
    }
    format!("item-{hash:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn item(id: &str, url: &str, title: &str, published_at: DateTime<Utc>) -> DiscoveredItem {
        DiscoveredItem {
            id: id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            snippet: format!("snippet text for {title}"),
            image_url: None,
            published_at,
            priority: 50.0,
            source_id: Uuid::new_v4(),
            source_name: "Feed".to_string(),
            source_kind: driftline_common::SourceKind::Rss,
        }
    }

    #[test]
    fn add_counts_added_and_skipped() {
        let store = ItemStore::new();
        let now = Utc::now();
        let result = store
            .add(vec![
                item("a", "https://e.com/1", "First unrelated headline about rockets", now),
                item("b", "https://e.com/1", "Second story on deep sea exploration", now),
                item("c", "", "No url so this one is dropped", now),
            ])
            .unwrap();
        assert_eq!(result.added, 1);
        assert_eq!(result.skipped, 2);
    }

    #[test]
    fn near_duplicate_titles_are_skipped_across_batches() {
        let store = ItemStore::new();
        let now = Utc::now();
        store
            .add(vec![item("a", "https://e.com/1", "OpenAI releases new frontier model", now)])
            .unwrap();
        let result = store
            .add(vec![item("b", "https://e.com/2", "OpenAI releases new frontier models", now)])
            .unwrap();
        assert_eq!(result.added, 0);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn missing_id_is_derived_from_url_deterministically() {
        let store = ItemStore::new();
        let result = store
            .add(vec![item("", "https://e.com/x", "A headline of reasonable length", Utc::now())])
            .unwrap();
        assert_eq!(result.added, 1);
        let expected = url_id("https://e.com/x");
        assert!(store.get_by_id(&expected).is_some());
    }

    #[test]
    fn date_range_is_inclusive_and_newest_first() {
        let store = ItemStore::new();
        let now = Utc::now();
        store
            .add(vec![
                item("old", "https://e.com/old", "Archive piece on ancient trade routes", now - Duration::days(3)),
                item("mid", "https://e.com/mid", "Analysis of municipal transit budgets", now - Duration::days(1)),
                item("new", "https://e.com/new", "Breaking coverage of the summit talks", now),
            ])
            .unwrap();

        let hits = store.get_by_date_range(now - Duration::days(1), now);
        let ids: Vec<&str> = hits.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);

        assert!(store.get_by_date_range(now, now - Duration::days(1)).is_empty());
    }

    #[test]
    fn search_is_case_insensitive_and_blank_query_matches_nothing() {
        let store = ItemStore::new();
        store
            .add(vec![item("a", "https://e.com/1", "Quantum Networking Milestone", Utc::now())])
            .unwrap();
        assert_eq!(store.search("quantum").len(), 1);
        assert!(store.search("   ").is_empty());
    }

    #[test]
    fn prune_evicts_items_and_their_dedup_signals() {
        let store = ItemStore::new();
        let old = Utc::now() - Duration::days(10);
        store
            .add(vec![item("a", "https://e.com/old", "Stale report on harvest yields", old)])
            .unwrap();
        store.prune(7).unwrap();
        assert_eq!(store.stats().count, 0);

        // Same title again must be admitted now that the signal is gone.
        let result = store
            .add(vec![item("b", "https://e.com/new", "Stale report on harvest yields", Utc::now())])
            .unwrap();
        assert_eq!(result.added, 1);
    }

    #[test]
    fn stats_report_publish_extremes() {
        let store = ItemStore::new();
        let now = Utc::now();
        store
            .add(vec![
                item("a", "https://e.com/1", "Completely unrelated story about glaciers", now - Duration::days(2)),
                item("b", "https://e.com/2", "Separate piece covering chip manufacturing", now),
            ])
            .unwrap();
        let stats = store.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.newest, Some(now));
    }
}
