//! Stage 10: ranking. Combines caller relevance, coverage momentum, and
//! temporal decay into each cluster's final rank.

use async_trait::async_trait;
use chrono::Utc;

use driftline_common::{Category, DriftlineError, StoryCluster, TrendIndicator};

use crate::params::ControlParams;
use crate::stages::{RunContext, Stage};

const DEFAULT_RELEVANCE: f32 = 50.0;
const RELEVANCE_WEIGHT: f32 = 0.7;
const MOMENTUM_WEIGHT: f32 = 0.3;
const MOMENTUM_PER_MEMBER: f32 = 20.0;

/// Per-hour decay constants. Politics goes stale fast; philosophy barely
/// ages.
fn decay_lambda(category: Category) -> f64 {
    match category {
        Category::Politics => 0.05,
        Category::Philosophy => 0.001,
        _ => 0.01,
    }
}

pub struct ScoringStage;

impl ScoringStage {
    fn momentum(member_count: usize) -> f32 {
        (member_count as f32 * MOMENTUM_PER_MEMBER).min(100.0)
    }

    fn decay(cluster: &StoryCluster) -> f64 {
        let freshest = match cluster.freshest_published_at() {
            Some(t) => t,
            None => return 1.0,
        };
        let age_hours = (Utc::now() - freshest).num_seconds().max(0) as f64 / 3600.0;
        (-decay_lambda(cluster.category) * age_hours).exp()
    }
}

#[async_trait]
impl Stage<Vec<StoryCluster>, Vec<StoryCluster>> for ScoringStage {
    fn name(&self) -> &'static str {
        "scoring"
    }

    async fn run(
        &self,
        mut clusters: Vec<StoryCluster>,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<StoryCluster>, DriftlineError> {
        ctx.check_cancelled()?;

        for cluster in &mut clusters {
            let relevance = params
                .interests
                .get(&cluster.category)
                .copied()
                .unwrap_or(DEFAULT_RELEVANCE);
            let momentum = Self::momentum(cluster.items.len());
            let decay = Self::decay(cluster);

            cluster.relevance_score = relevance;
            cluster.momentum_score = momentum;
            cluster.final_rank =
                ((relevance * RELEVANCE_WEIGHT + momentum * MOMENTUM_WEIGHT) as f64 * decay) as f32;
            cluster.trend = if cluster.items.len() >= 3 {
                TrendIndicator::Rising
            } else {
                TrendIndicator::New
            };
        }

        clusters.sort_by(|a, b| {
            b.final_rank
                .partial_cmp(&a.final_rank)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support;
    use chrono::{Duration, Utc};
    use driftline_common::HydratedItem;
    use uuid::Uuid;

    fn cluster(
        category: Category,
        members: usize,
        published_hours_ago: i64,
    ) -> StoryCluster {
        let items: Vec<HydratedItem> = (0..members)
            .map(|i| {
                let raw = driftline_common::DiscoveredItem {
                    id: Uuid::new_v4().to_string(),
                    url: format!("https://e.com/{}", Uuid::new_v4()),
                    title: format!("member {i}"),
                    snippet: "summary".to_string(),
                    image_url: None,
                    published_at: Utc::now() - Duration::hours(published_hours_ago),
                    priority: 50.0,
                    source_id: Uuid::new_v4(),
                    source_name: "Feed".to_string(),
                    source_kind: driftline_common::SourceKind::Rss,
                };
                let mut h = HydratedItem::from_discovered(&raw);
                h.category = category;
                h
            })
            .collect();
        let mut c = StoryCluster::seed(items);
        c.category = category;
        c
    }

    #[tokio::test]
    async fn momentum_saturates_at_one_hundred() {
        assert_eq!(ScoringStage::momentum(1), 20.0);
        assert_eq!(ScoringStage::momentum(5), 100.0);
        assert_eq!(ScoringStage::momentum(50), 100.0);
    }

    #[tokio::test]
    async fn fresh_heavily_covered_cluster_outranks_stale_thin_one() {
        let out = ScoringStage
            .run(
                vec![
                    cluster(Category::Tech, 1, 48),
                    cluster(Category::Tech, 5, 0),
                ],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();
        assert_eq!(out[0].items.len(), 5);
        assert!(out[0].final_rank > out[1].final_rank);
    }

    #[tokio::test]
    async fn politics_decays_faster_than_philosophy() {
        let out = ScoringStage
            .run(
                vec![
                    cluster(Category::Politics, 2, 24),
                    cluster(Category::Philosophy, 2, 24),
                ],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();
        let politics = out.iter().find(|c| c.category == Category::Politics).unwrap();
        let philosophy = out.iter().find(|c| c.category == Category::Philosophy).unwrap();
        // Same relevance and momentum; only the decay constant differs.
        assert!(philosophy.final_rank > politics.final_rank);
    }

    #[tokio::test]
    async fn interest_weights_move_relevance() {
        let mut interests = driftline_common::InterestWeights::new();
        interests.insert(Category::Cooking, 95.0);
        let params = ControlParams::builder().interests(interests).build();

        let out = ScoringStage
            .run(
                vec![
                    cluster(Category::Cooking, 1, 0),
                    cluster(Category::Music, 1, 0),
                ],
                &params,
                &test_support::context(),
            )
            .await
            .unwrap();
        assert_eq!(out[0].category, Category::Cooking);
        assert_eq!(out[0].relevance_score, 95.0);
        assert_eq!(out[1].relevance_score, DEFAULT_RELEVANCE);
    }

    #[tokio::test]
    async fn identical_clusters_rank_by_freshness() {
        // Same relevance, same momentum; only age differs.
        let out = ScoringStage
            .run(
                vec![
                    cluster(Category::Tech, 2, 24),
                    cluster(Category::Tech, 2, 0),
                ],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();
        assert!(out[0].final_rank > out[1].final_rank);
        assert!(out[0].freshest_published_at() > out[1].freshest_published_at());
    }

    #[tokio::test]
    async fn fresh_cluster_rank_matches_closed_form() {
        let out = ScoringStage
            .run(
                vec![cluster(Category::Tech, 2, 0)],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();
        // relevance 50, momentum 40, decay ~1 → (50*0.7 + 40*0.3) = 47
        assert!((out[0].final_rank - 47.0).abs() < 0.5);
    }
}
