//! Connector contract: per-source-kind collaborators that discover candidate
//! items, fetch full content for one item, and normalize a raw item into
//! canonical form. Implementations (feed pull, release APIs, scrapers) live
//! outside this crate.

use anyhow::Result;
use async_trait::async_trait;

use driftline_common::{DiscoveredItem, HydratedItem, SourceDescriptor};

#[async_trait]
pub trait Connector: Send + Sync {
    /// Return candidate items for a source. Cheap, list-level I/O.
    async fn discover(&self, source: &SourceDescriptor) -> Result<Vec<DiscoveredItem>>;

    /// Fetch full content for one discovered item. Expensive; only called
    /// for items that survived triage.
    async fn hydrate(&self, item: &DiscoveredItem) -> Result<String>;

    /// Normalize a raw item (with full content attached) into canonical form.
    async fn normalize(
        &self,
        item: DiscoveredItem,
        source: &SourceDescriptor,
    ) -> Result<HydratedItem>;
}
