//! Stage 5: full-content hydration. The expensive stage; everything before
//! it exists to shrink its input.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use driftline_common::{
    DiscoveredItem, DriftlineError, HydratedItem, SourceDescriptor, SourceKind,
};

use crate::connector::Connector;
use crate::params::ControlParams;
use crate::runner::run_bounded;
use crate::stages::{RunContext, Stage};

const HYDRATION_CONCURRENCY: usize = 5;
/// A snippet this long with an image attached is treated as already rich
/// enough; no fetch is made for it.
const RICH_SNIPPET_CHARS: usize = 1500;

pub struct HydrationStage {
    connectors: Arc<HashMap<SourceKind, Arc<dyn Connector>>>,
}

/// Hydration needs the source descriptors to hand to `normalize`.
pub struct HydrationInput {
    pub items: Vec<DiscoveredItem>,
    pub sources: Vec<SourceDescriptor>,
}

impl HydrationStage {
    pub fn new(connectors: Arc<HashMap<SourceKind, Arc<dyn Connector>>>) -> Self {
        Self { connectors }
    }

    fn is_rich(item: &DiscoveredItem) -> bool {
        item.snippet.chars().count() >= RICH_SNIPPET_CHARS && item.image_url.is_some()
    }

    async fn hydrate_one(
        &self,
        mut item: DiscoveredItem,
        source: &SourceDescriptor,
    ) -> anyhow::Result<HydratedItem> {
        let connector = self
            .connectors
            .get(&item.source_kind)
            .ok_or_else(|| anyhow::anyhow!("no connector for {:?}", item.source_kind))?;

        if !Self::is_rich(&item) {
            item.snippet = connector.hydrate(&item).await?;
        }
        connector.normalize(item, source).await
    }
}

#[async_trait]
impl Stage<HydrationInput, Vec<HydratedItem>> for HydrationStage {
    fn name(&self) -> &'static str {
        "hydration"
    }

    async fn run(
        &self,
        input: HydrationInput,
        _params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<HydratedItem>, DriftlineError> {
        ctx.check_cancelled()?;

        let sources: HashMap<_, _> = input
            .sources
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut tasks = Vec::with_capacity(input.items.len());
        let mut skipped = 0usize;
        for item in input.items {
            match sources.get(&item.source_id) {
                Some(source) => tasks.push(self.hydrate_one(item, source)),
                None => {
                    warn!(url = %item.url, "Item's source disappeared, dropping");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "Items dropped before hydration");
        }

        let hydrated: Vec<HydratedItem> = run_bounded(HYDRATION_CONCURRENCY, tasks)
            .await
            .into_iter()
            .flatten()
            .collect();

        ctx.check_cancelled()?;
        Ok(hydrated)
    }
}
