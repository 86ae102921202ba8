//! Stage 9: cluster synthesis. The biggest clusters get an editorial
//! narrative from the Brain; the rest keep their seed title.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use brain_client::{Brain, SynthesisItem, SynthesisRequest};
use driftline_common::{DriftlineError, StoryCluster};

use crate::params::ControlParams;
use crate::stages::{RunContext, Stage};

pub struct SynthesisStage {
    brain: Arc<dyn Brain>,
}

impl SynthesisStage {
    pub fn new(brain: Arc<dyn Brain>) -> Self {
        Self { brain }
    }
}

#[async_trait]
impl Stage<Vec<StoryCluster>, Vec<StoryCluster>> for SynthesisStage {
    fn name(&self) -> &'static str {
        "synthesis"
    }

    async fn run(
        &self,
        mut clusters: Vec<StoryCluster>,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<StoryCluster>, DriftlineError> {
        ctx.check_cancelled()?;

        // Biggest stories first; only the top slice costs synthesis calls.
        clusters.sort_by(|a, b| b.items.len().cmp(&a.items.len()));

        for cluster in clusters.iter_mut().take(params.max_synthesis_clusters) {
            ctx.check_cancelled()?;
            let request = SynthesisRequest {
                items: cluster
                    .items
                    .iter()
                    .map(|i| SynthesisItem {
                        source: i.source_name.clone(),
                        title: i.title.clone(),
                        summary: i.summary.clone(),
                    })
                    .collect(),
                persona: params.synthesis_persona.clone(),
                detail: params.synthesis_detail,
            };

            match self.brain.synthesize(&request).await {
                Ok(synthesis) => {
                    if !synthesis.title.trim().is_empty() {
                        cluster.title = synthesis.title;
                    }
                    cluster.narrative = synthesis.narrative;
                    cluster.why_it_matters = synthesis.why_it_matters;
                }
                Err(e) => {
                    // Raw title, empty narrative. The cluster still ships.
                    warn!(cluster = %cluster.id, error = %e, "Synthesis failed");
                }
            }
        }

        Ok(clusters)
    }
}
