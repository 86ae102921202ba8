//! Deterministic fixtures for exercising the pipeline without network or
//! provider access. Used by the integration tests; kept in the library so
//! downstream crates can script runs the same way.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use driftline_common::{DiscoveredItem, HydratedItem, SourceDescriptor, SourceKind};

use crate::connector::Connector;

/// A connector that serves scripted items per source name. `discover`
/// returns the scripted batch; `hydrate` expands the snippet; `normalize`
/// passes content through with a topic guess from the title.
#[derive(Default)]
pub struct FixtureConnector {
    batches: Mutex<Vec<(String, Vec<DiscoveredItem>)>>,
}

impl FixtureConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the items `discover` returns for a source with this name.
    pub fn stage_items(&self, source_name: &str, items: Vec<DiscoveredItem>) {
        self.batches
            .lock()
            .unwrap()
            .push((source_name.to_string(), items));
    }
}

#[async_trait]
impl Connector for FixtureConnector {
    async fn discover(&self, source: &SourceDescriptor) -> Result<Vec<DiscoveredItem>> {
        let batches = self.batches.lock().unwrap();
        Ok(batches
            .iter()
            .filter(|(name, _)| name == &source.name)
            .flat_map(|(_, items)| items.clone())
            .collect())
    }

    async fn hydrate(&self, item: &DiscoveredItem) -> Result<String> {
        Ok(format!("{} Full article body follows the lede.", item.snippet))
    }

    async fn normalize(
        &self,
        item: DiscoveredItem,
        _source: &SourceDescriptor,
    ) -> Result<HydratedItem> {
        let mut hydrated = HydratedItem::from_discovered(&item);
        hydrated.full_text = Some(item.snippet.clone());
        hydrated.summary = item.snippet.chars().take(280).collect();
        hydrated.category = driftline_common::Category::from_topic(
            item.title.split_whitespace().next().unwrap_or(""),
        );
        Ok(hydrated)
    }
}

/// A discovered item with sensible defaults for tests.
pub fn fixture_item(source: &SourceDescriptor, title: &str, url: &str) -> DiscoveredItem {
    DiscoveredItem {
        id: Uuid::new_v4().to_string(),
        url: url.to_string(),
        title: title.to_string(),
        snippet: format!("Snippet describing: {title}."),
        image_url: None,
        published_at: Utc::now(),
        priority: 50.0,
        source_id: source.id,
        source_name: source.name.clone(),
        source_kind: source.kind,
    }
}

/// An active RSS source with the given name.
pub fn fixture_source(name: &str) -> SourceDescriptor {
    SourceDescriptor::new(name, SourceKind::Rss, format!("https://{name}.example/rss"))
}
