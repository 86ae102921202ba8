//! Stage 1: concurrent discovery fan-out over the active sources.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::warn;

use driftline_common::{DiscoveredItem, DriftlineError, SourceDescriptor, SourceKind};

use crate::connector::Connector;
use crate::params::ControlParams;
use crate::stages::{RunContext, Stage};

const DISCOVERY_CONCURRENCY: usize = 5;
const DEFAULT_PRIORITY: f32 = 50.0;

pub struct DiscoveryStage {
    connectors: Arc<HashMap<SourceKind, Arc<dyn Connector>>>,
}

impl DiscoveryStage {
    pub fn new(connectors: Arc<HashMap<SourceKind, Arc<dyn Connector>>>) -> Self {
        Self { connectors }
    }

    async fn discover_source(&self, source: &SourceDescriptor, cap: usize) -> Vec<DiscoveredItem> {
        let Some(connector) = self.connectors.get(&source.kind) else {
            warn!(source = %source.name, kind = ?source.kind, "No connector registered");
            return Vec::new();
        };
        match connector.discover(source).await {
            Ok(mut items) => {
                items.truncate(cap);
                let priority = source.signal_score.unwrap_or(DEFAULT_PRIORITY);
                for item in &mut items {
                    item.source_id = source.id;
                    item.source_name = source.name.clone();
                    item.source_kind = source.kind;
                    item.priority = priority;
                }
                items
            }
            Err(e) => {
                // One broken source never takes the run down.
                warn!(source = %source.name, error = %e, "Discovery failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Stage<Vec<SourceDescriptor>, Vec<DiscoveredItem>> for DiscoveryStage {
    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn run(
        &self,
        sources: Vec<SourceDescriptor>,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<DiscoveredItem>, DriftlineError> {
        ctx.check_cancelled()?;

        let cap = params.max_items_per_source;
        let mut fetches = Vec::with_capacity(sources.len());
        for source in sources.iter().filter(|s| s.active) {
            fetches.push(self.discover_source(source, cap));
        }

        let batches: Vec<Vec<DiscoveredItem>> = stream::iter(fetches)
            .buffer_unordered(DISCOVERY_CONCURRENCY)
            .collect()
            .await;

        Ok(batches.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support;
    use anyhow::Result;
    use chrono::Utc;
    use driftline_common::HydratedItem;
    use uuid::Uuid;

    struct FakeConnector {
        per_source: usize,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn discover(&self, source: &SourceDescriptor) -> Result<Vec<DiscoveredItem>> {
            if self.fail_for.as_deref() == Some(source.name.as_str()) {
                anyhow::bail!("connection refused");
            }
            Ok((0..self.per_source)
                .map(|i| DiscoveredItem {
                    id: Uuid::new_v4().to_string(),
                    url: format!("https://{}/item/{i}", source.name),
                    title: format!("Item {i} from {}", source.name),
                    snippet: String::new(),
                    image_url: None,
                    published_at: Utc::now(),
                    priority: 0.0,
                    source_id: Uuid::nil(),
                    source_name: String::new(),
                    source_kind: SourceKind::Rss,
                })
                .collect())
        }

        async fn hydrate(&self, _item: &DiscoveredItem) -> Result<String> {
            unreachable!("discovery never hydrates")
        }

        async fn normalize(
            &self,
            item: DiscoveredItem,
            _source: &SourceDescriptor,
        ) -> Result<HydratedItem> {
            Ok(HydratedItem::from_discovered(&item))
        }
    }

    fn stage(per_source: usize, fail_for: Option<&str>) -> DiscoveryStage {
        let mut connectors: HashMap<SourceKind, Arc<dyn Connector>> = HashMap::new();
        connectors.insert(
            SourceKind::Rss,
            Arc::new(FakeConnector {
                per_source,
                fail_for: fail_for.map(String::from),
            }),
        );
        DiscoveryStage::new(Arc::new(connectors))
    }

    #[tokio::test]
    async fn stamps_provenance_and_source_priority() {
        let stage = stage(2, None);
        let mut source = SourceDescriptor::new("alpha", SourceKind::Rss, "https://alpha/rss");
        source.signal_score = Some(80.0);

        let items = stage
            .run(vec![source.clone()], &ControlParams::default(), &test_support::context())
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        for item in &items {
            assert_eq!(item.source_id, source.id);
            assert_eq!(item.source_name, "alpha");
            assert_eq!(item.priority, 80.0);
        }
    }

    #[tokio::test]
    async fn missing_signal_score_defaults_priority_to_fifty() {
        let stage = stage(1, None);
        let source = SourceDescriptor::new("alpha", SourceKind::Rss, "https://alpha/rss");
        let items = stage
            .run(vec![source], &ControlParams::default(), &test_support::context())
            .await
            .unwrap();
        assert_eq!(items[0].priority, 50.0);
    }

    #[tokio::test]
    async fn failing_source_contributes_zero_items() {
        let stage = stage(3, Some("broken"));
        let ok = SourceDescriptor::new("alpha", SourceKind::Rss, "https://alpha/rss");
        let bad = SourceDescriptor::new("broken", SourceKind::Rss, "https://broken/rss");

        let items = stage
            .run(vec![ok, bad], &ControlParams::default(), &test_support::context())
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.source_name == "alpha"));
    }

    #[tokio::test]
    async fn inactive_sources_are_skipped_and_cap_is_enforced() {
        let stage = stage(10, None);
        let active = SourceDescriptor::new("alpha", SourceKind::Rss, "https://alpha/rss");
        let mut inactive = SourceDescriptor::new("beta", SourceKind::Rss, "https://beta/rss");
        inactive.active = false;

        let params = ControlParams::builder().max_items_per_source(4).build();
        let items = stage
            .run(vec![active, inactive], &params, &test_support::context())
            .await
            .unwrap();
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn fan_out_handles_more_sources_than_the_concurrency_limit() {
        let stage = stage(1, None);
        let sources: Vec<SourceDescriptor> = (0..8)
            .map(|i| SourceDescriptor::new(format!("feed{i}"), SourceKind::Rss, "https://x/rss"))
            .collect();

        let items = stage
            .run(sources, &ControlParams::default(), &test_support::context())
            .await
            .unwrap();
        assert_eq!(items.len(), 8);
        let mut names: Vec<&str> = items.iter().map(|i| i.source_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 8, "every source contributed exactly once");
    }

    #[tokio::test]
    async fn cancellation_aborts_at_entry() {
        let stage = stage(1, None);
        let source = SourceDescriptor::new("alpha", SourceKind::Rss, "https://alpha/rss");
        let err = stage
            .run(vec![source], &ControlParams::default(), &test_support::cancelled_context())
            .await
            .unwrap_err();
        assert!(err.is_aborted());
    }
}
