//! Repository contract: the durable/shared store for seen URLs and final
//! cluster state. An in-memory implementation ships for tests and
//! single-process deployments; a scaled deployment swaps in a database.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use driftline_common::{DailySummary, DiscoveredItem, StoryCluster};

#[async_trait]
pub trait Repository: Send + Sync {
    /// Of the given URLs, return only those not seen within the window.
    async fn filter_new_urls(&self, urls: &[String], window_hours: i64) -> Result<Vec<String>>;

    /// Record raw items as processed (marks their URLs seen).
    async fn persist_raw_items(&self, items: &[DiscoveredItem]) -> Result<()>;

    async fn save_clusters(&self, clusters: &[StoryCluster]) -> Result<()>;

    async fn save_daily_summary(&self, summary: &DailySummary) -> Result<()>;
}

/// Windowed in-memory repository. Seen URLs are kept with their first-seen
/// timestamp so history is bounded by the caller's window rather than
/// growing for the process lifetime.
#[derive(Default)]
pub struct InMemoryRepository {
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
    clusters: Mutex<Vec<StoryCluster>>,
    summaries: Mutex<Vec<DailySummary>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_clusters(&self) -> Vec<StoryCluster> {
        self.clusters.lock().unwrap().clone()
    }

    pub fn saved_summaries(&self) -> Vec<DailySummary> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn filter_new_urls(&self, urls: &[String], window_hours: i64) -> Result<Vec<String>> {
        let cutoff = Utc::now() - Duration::hours(window_hours);
        let seen = self.seen.lock().unwrap();
        Ok(urls
            .iter()
            .filter(|u| match seen.get(*u) {
                Some(first_seen) => *first_seen < cutoff,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn persist_raw_items(&self, items: &[DiscoveredItem]) -> Result<()> {
        let now = Utc::now();
        let mut seen = self.seen.lock().unwrap();
        for item in items {
            seen.entry(item.url.clone()).or_insert(now);
        }
        Ok(())
    }

    async fn save_clusters(&self, clusters: &[StoryCluster]) -> Result<()> {
        *self.clusters.lock().unwrap() = clusters.to_vec();
        Ok(())
    }

    async fn save_daily_summary(&self, summary: &DailySummary) -> Result<()> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}
