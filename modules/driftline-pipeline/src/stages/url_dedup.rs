//! Stage 2: exact-URL deduplication. Collapses the batch by URL, drops
//! anything the orchestrator has already processed, then asks the
//! repository which of the remainder are genuinely new inside the window.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use driftline_common::{DiscoveredItem, DriftlineError};

use crate::params::ControlParams;
use crate::stages::{RunContext, Stage};

pub struct UrlDedupStage;

#[async_trait]
impl Stage<Vec<DiscoveredItem>, Vec<DiscoveredItem>> for UrlDedupStage {
    fn name(&self) -> &'static str {
        "url_dedup"
    }

    async fn run(
        &self,
        items: Vec<DiscoveredItem>,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<DiscoveredItem>, DriftlineError> {
        ctx.check_cancelled()?;
        let before = items.len();

        // In-batch collapse, first occurrence wins.
        let mut by_url: HashMap<String, DiscoveredItem> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for item in items {
            if !by_url.contains_key(&item.url) {
                order.push(item.url.clone());
                by_url.insert(item.url.clone(), item);
            }
        }

        // Drop what this orchestrator already processed.
        order.retain(|url| !ctx.seen_urls.contains(url));

        let fresh: HashSet<String> = ctx
            .repository
            .filter_new_urls(&order, params.discovery_window_hours)
            .await
            .map_err(DriftlineError::Anyhow)?
            .into_iter()
            .collect();

        let kept: Vec<DiscoveredItem> = order
            .into_iter()
            .filter(|url| fresh.contains(url))
            .filter_map(|url| by_url.remove(&url))
            .collect();

        debug!(before, after = kept.len(), "URL dedup");
        Ok(kept)
    }
}
