//! Stage 4: cheap interest triage over title and snippet. Decides what is
//! worth the expensive hydration fetches.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use brain_client::{Brain, RankCandidate};
use driftline_common::{Category, DiscoveredItem, DriftlineError};

use crate::params::ControlParams;
use crate::stages::{RunContext, Stage};

const TRIAGE_BATCH_SIZE: usize = 50;
const NEUTRAL_SCORE: f32 = 50.0;
const INTEREST_WEIGHT: f32 = 0.7;
const PRIORITY_WEIGHT: f32 = 0.3;

pub struct TriageStage {
    brain: Arc<dyn Brain>,
}

impl TriageStage {
    pub fn new(brain: Arc<dyn Brain>) -> Self {
        Self { brain }
    }

    fn interest_labels(params: &ControlParams) -> HashMap<String, f32> {
        params
            .interests
            .iter()
            .map(|(category, weight)| (label(*category).to_string(), *weight))
            .collect()
    }
}

fn label(category: Category) -> &'static str {
    match category {
        Category::Tech => "TECH",
        Category::Politics => "POLITICS",
        Category::Philosophy => "PHILOSOPHY",
        Category::Music => "MUSIC",
        Category::Cooking => "COOKING",
        Category::General => "GENERAL",
    }
}

#[async_trait]
impl Stage<Vec<DiscoveredItem>, Vec<DiscoveredItem>> for TriageStage {
    fn name(&self) -> &'static str {
        "triage"
    }

    async fn run(
        &self,
        items: Vec<DiscoveredItem>,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<DiscoveredItem>, DriftlineError> {
        ctx.check_cancelled()?;
        if items.is_empty() {
            return Ok(items);
        }

        let interests = Self::interest_labels(params);
        let mut scored: Vec<(f32, DiscoveredItem)> = Vec::with_capacity(items.len());

        for batch in items.chunks(TRIAGE_BATCH_SIZE) {
            ctx.check_cancelled()?;
            let candidates: Vec<RankCandidate> = batch
                .iter()
                .map(|item| RankCandidate {
                    title: item.title.clone(),
                    snippet: item.snippet.clone(),
                })
                .collect();

            let interest_scores = match self.brain.rank(&candidates, &interests).await {
                Ok(scores) if scores.len() == batch.len() => scores,
                Ok(scores) => {
                    warn!(
                        expected = batch.len(),
                        got = scores.len(),
                        "Rank returned wrong arity, scoring batch neutral"
                    );
                    vec![NEUTRAL_SCORE; batch.len()]
                }
                Err(e) => {
                    warn!(error = %e, "Rank failed, scoring batch neutral");
                    vec![NEUTRAL_SCORE; batch.len()]
                }
            };

            for (item, interest) in batch.iter().zip(interest_scores) {
                let combined = interest * INTEREST_WEIGHT + item.priority * PRIORITY_WEIGHT;
                scored.push((combined, item.clone()));
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let kept: Vec<DiscoveredItem> = scored
            .into_iter()
            .filter(|(score, _)| *score >= params.min_interest_score)
            .take(params.max_hydration_limit)
            .map(|(score, mut item)| {
                item.priority = score;
                item
            })
            .collect();

        Ok(kept)
    }
}
