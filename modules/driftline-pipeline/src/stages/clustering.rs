//! Stage 8: story clustering. Groups surviving items into story clusters
//! by embedding proximity; looser than semantic dedup because "covers the
//! same story" is a wider net than "is the same article".

use async_trait::async_trait;
use tracing::debug;

use driftline_common::{Category, DriftlineError, HydratedItem, StoryCluster};

use crate::params::ControlParams;
use crate::similarity::cosine;
use crate::stages::{RunContext, Stage};

pub struct ClusteringStage;

impl ClusteringStage {
    /// Greedy single-pass assignment against each cluster's seed member.
    /// O(n·k), bounded by the hydration cap. Deterministic for a fixed
    /// input order.
    fn assign(items: Vec<HydratedItem>, epsilon: f64) -> Vec<Vec<HydratedItem>> {
        let mut clusters: Vec<Vec<HydratedItem>> = Vec::new();
        for item in items {
            let home = clusters
                .iter_mut()
                .find(|c| cosine(&c[0].embedding, &item.embedding) >= epsilon);
            match home {
                Some(cluster) => cluster.push(item),
                None => clusters.push(vec![item]),
            }
        }
        clusters
    }

    /// A cluster's category is its members' most common one; ties break
    /// toward the seed's category.
    fn dominant_category(members: &[HydratedItem]) -> Category {
        let seed = members[0].category;
        let mut best = seed;
        let mut best_count = 0usize;
        for member in members {
            let count = members.iter().filter(|m| m.category == member.category).count();
            if count > best_count || (count == best_count && member.category == seed) {
                best = member.category;
                best_count = count;
            }
        }
        best
    }
}

#[async_trait]
impl Stage<Vec<HydratedItem>, Vec<StoryCluster>> for ClusteringStage {
    fn name(&self) -> &'static str {
        "clustering"
    }

    async fn run(
        &self,
        items: Vec<HydratedItem>,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<StoryCluster>, DriftlineError> {
        ctx.check_cancelled()?;
        let total = items.len();

        let clusters: Vec<StoryCluster> = Self::assign(items, params.clustering_epsilon)
            .into_iter()
            .filter(|members| members.len() >= params.min_cluster_size)
            .map(|members| {
                let category = Self::dominant_category(&members);
                let mut cluster = StoryCluster::seed(members);
                cluster.category = category;
                cluster
            })
            .collect();

        debug!(items = total, clusters = clusters.len(), "Clustering");
        Ok(clusters)
    }
}
