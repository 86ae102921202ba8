//! Stage 7: semantic deduplication. Items whose embeddings are almost
//! parallel describe the same article; each group keeps one survivor and
//! the group is cross-referenced by the Brain for factual conflicts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use brain_client::{Brain, SynthesisItem};
use driftline_common::{DriftlineError, HydratedItem, Scrutiny};

use crate::params::ControlParams;
use crate::similarity::cosine;
use crate::stages::{RunContext, Stage};

pub struct SemanticDedupStage {
    brain: Arc<dyn Brain>,
}

impl SemanticDedupStage {
    pub fn new(brain: Arc<dyn Brain>) -> Self {
        Self { brain }
    }

    /// Greedy grouping: each item joins the first group whose seed it is
    /// close enough to, else starts a new one. Deterministic for a fixed
    /// input order.
    fn group(items: Vec<HydratedItem>, threshold: f64) -> Vec<Vec<HydratedItem>> {
        let mut groups: Vec<Vec<HydratedItem>> = Vec::new();
        for item in items {
            let joined = groups.iter_mut().find(|group| {
                cosine(&group[0].embedding, &item.embedding) >= threshold
            });
            match joined {
                Some(group) => group.push(item),
                None => groups.push(vec![item]),
            }
        }
        groups
    }

    /// The survivor is the member with an image, else the first discovered.
    fn survivor_index(group: &[HydratedItem]) -> usize {
        group
            .iter()
            .position(|i| i.image_url.is_some())
            .unwrap_or(0)
    }

    async fn scrutinize(&self, group: &[HydratedItem]) -> Scrutiny {
        let members: Vec<SynthesisItem> = group
            .iter()
            .map(|i| SynthesisItem {
                source: i.source_name.clone(),
                title: i.title.clone(),
                summary: i.summary.clone(),
            })
            .collect();

        match self.brain.scrutinize(&members).await {
            Ok(report) => Scrutiny {
                integrity_score: report.integrity_score,
                is_controversial: report.is_controversial,
                conflict_points: report.conflict_points,
                flags: Vec::new(),
            },
            Err(e) => {
                warn!(error = %e, "Scrutiny failed, attaching neutral report");
                Scrutiny {
                    integrity_score: 100.0,
                    ..Scrutiny::default()
                }
            }
        }
    }
}

#[async_trait]
impl Stage<Vec<HydratedItem>, Vec<HydratedItem>> for SemanticDedupStage {
    fn name(&self) -> &'static str {
        "semantic_dedup"
    }

    async fn run(
        &self,
        items: Vec<HydratedItem>,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<HydratedItem>, DriftlineError> {
        ctx.check_cancelled()?;
        let before = items.len();

        let groups = Self::group(items, params.semantic_dup_threshold);
        let mut survivors = Vec::with_capacity(groups.len());
        for group in groups {
            ctx.check_cancelled()?;
            let idx = Self::survivor_index(&group);
            let mut survivor = group[idx].clone();
            if group.len() > 1 {
                survivor.scrutiny = Some(self.scrutinize(&group).await);
            }
            survivors.push(survivor);
        }

        debug!(before, after = survivors.len(), "Semantic dedup");
        Ok(survivors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support;
    use anyhow::Result;
    use brain_client::{
        ClusterDigest, GlobalSummary, Normalization, RankCandidate, ScrutinyReport, Synthesis,
        SynthesisRequest,
    };
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    struct StubBrain {
        fail_scrutiny: bool,
    }

    #[async_trait]
    impl Brain for StubBrain {
        async fn rank(
            &self,
            items: &[RankCandidate],
            _interests: &HashMap<String, f32>,
        ) -> Result<Vec<f32>> {
            Ok(vec![50.0; items.len()])
        }

        async fn normalize(&self, _text: &str) -> Result<Normalization> {
            Ok(Normalization::default())
        }

        async fn scrutinize(&self, _items: &[SynthesisItem]) -> Result<ScrutinyReport> {
            if self.fail_scrutiny {
                anyhow::bail!("provider down");
            }
            Ok(ScrutinyReport {
                integrity_score: 72.0,
                is_controversial: true,
                conflict_points: vec!["casualty figures differ".to_string()],
            })
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(Vec::new())
        }

        async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Synthesis> {
            Ok(Synthesis::default())
        }

        async fn synthesize_global(
            &self,
            _clusters: &[ClusterDigest],
            _persona: &str,
        ) -> Result<GlobalSummary> {
            Ok(GlobalSummary::default())
        }
    }

    fn item(title: &str, embedding: Vec<f32>, image: bool) -> HydratedItem {
        let raw = driftline_common::DiscoveredItem {
            id: Uuid::new_v4().to_string(),
            url: format!("https://e.com/{}", Uuid::new_v4()),
            title: title.to_string(),
            snippet: "summary".to_string(),
            image_url: image.then(|| "https://e.com/i.jpg".to_string()),
            published_at: Utc::now(),
            priority: 50.0,
            source_id: Uuid::new_v4(),
            source_name: "Feed".to_string(),
            source_kind: driftline_common::SourceKind::Rss,
        };
        let mut hydrated = HydratedItem::from_discovered(&raw);
        hydrated.embedding = embedding;
        hydrated
    }

    #[tokio::test]
    async fn near_parallel_vectors_collapse_to_one_survivor_with_scrutiny() {
        let stage = SemanticDedupStage::new(Arc::new(StubBrain { fail_scrutiny: false }));
        let out = stage
            .run(
                vec![
                    item("wire copy", vec![1.0, 0.0, 0.0], false),
                    item("same story syndicated", vec![0.999, 0.01, 0.0], true),
                    item("unrelated", vec![0.0, 1.0, 0.0], false),
                ],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        // Survivor of the duplicate pair is the one with an image.
        let survivor = out.iter().find(|i| i.title.contains("syndicated")).unwrap();
        let scrutiny = survivor.scrutiny.as_ref().unwrap();
        assert_eq!(scrutiny.integrity_score, 72.0);
        assert!(scrutiny.is_controversial);
        // Singletons carry no scrutiny record.
        let single = out.iter().find(|i| i.title == "unrelated").unwrap();
        assert!(single.scrutiny.is_none());
    }

    #[tokio::test]
    async fn imageless_group_keeps_first_discovered() {
        let stage = SemanticDedupStage::new(Arc::new(StubBrain { fail_scrutiny: false }));
        let out = stage
            .run(
                vec![
                    item("first", vec![1.0, 0.0], false),
                    item("second", vec![1.0, 0.0], false),
                ],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "first");
    }

    #[tokio::test]
    async fn scrutiny_failure_attaches_neutral_report() {
        let stage = SemanticDedupStage::new(Arc::new(StubBrain { fail_scrutiny: true }));
        let out = stage
            .run(
                vec![
                    item("a", vec![1.0, 0.0], false),
                    item("b", vec![1.0, 0.0], false),
                ],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();
        let scrutiny = out[0].scrutiny.as_ref().unwrap();
        assert_eq!(scrutiny.integrity_score, 100.0);
        assert!(!scrutiny.is_controversial);
    }

    #[tokio::test]
    async fn similar_but_distinct_stories_both_survive() {
        // Cosine ~0.9: same topic, different article. Below the 0.95 bar.
        let stage = SemanticDedupStage::new(Arc::new(StubBrain { fail_scrutiny: false }));
        let out = stage
            .run(
                vec![
                    item("a", vec![1.0, 0.0], false),
                    item("b", vec![0.9, 0.436], false),
                ],
                &ControlParams::default(),
                &test_support::context(),
            )
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
    }
}
