//! Stage 11: persistence. Hands the ranked clusters to the repository and
//! passes them through unchanged.

use async_trait::async_trait;

use driftline_common::{DriftlineError, StoryCluster};

use crate::params::ControlParams;
use crate::stages::{RunContext, Stage};

pub struct PersistenceStage;

#[async_trait]
impl Stage<Vec<StoryCluster>, Vec<StoryCluster>> for PersistenceStage {
    fn name(&self) -> &'static str {
        "persistence"
    }

    async fn run(
        &self,
        clusters: Vec<StoryCluster>,
        _params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<StoryCluster>, DriftlineError> {
        ctx.check_cancelled()?;
        ctx.repository
            .save_clusters(&clusters)
            .await
            .map_err(DriftlineError::Anyhow)?;
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::stages::RunContext;
    use driftline_common::HydratedItem;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn clusters_are_saved_and_passed_through() {
        let repo = Arc::new(InMemoryRepository::new());
        let ctx = RunContext::new(
            repo.clone(),
            HashSet::new(),
            Arc::new(AtomicBool::new(false)),
            None,
        );

        let raw = driftline_common::DiscoveredItem {
            id: "x".to_string(),
            url: "https://e.com/x".to_string(),
            title: "headline".to_string(),
            snippet: String::new(),
            image_url: None,
            published_at: chrono::Utc::now(),
            priority: 50.0,
            source_id: uuid::Uuid::new_v4(),
            source_name: "Feed".to_string(),
            source_kind: driftline_common::SourceKind::Rss,
        };
        let clusters = vec![StoryCluster::seed(vec![HydratedItem::from_discovered(&raw)])];

        let out = PersistenceStage
            .run(clusters, &ControlParams::default(), &ctx)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(repo.saved_clusters().len(), 1);
    }
}
