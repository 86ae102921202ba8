//! Stage 6: embedding backfill. Only items missing a vector hit the
//! provider; items whose embed call fails are dropped, since everything
//! downstream needs a vector.

use std::sync::Arc;

use async_trait::async_trait;

use brain_client::Brain;
use driftline_common::{DriftlineError, HydratedItem};

use crate::params::ControlParams;
use crate::runner::run_bounded;
use crate::stages::{RunContext, Stage};

const EMBEDDING_CONCURRENCY: usize = 10;

pub struct EmbeddingStage {
    brain: Arc<dyn Brain>,
}

impl EmbeddingStage {
    pub fn new(brain: Arc<dyn Brain>) -> Self {
        Self { brain }
    }
}

#[async_trait]
impl Stage<Vec<HydratedItem>, Vec<HydratedItem>> for EmbeddingStage {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn run(
        &self,
        items: Vec<HydratedItem>,
        _params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<HydratedItem>, DriftlineError> {
        ctx.check_cancelled()?;

        let tasks: Vec<_> = items
            .into_iter()
            .map(|mut item| {
                let brain = Arc::clone(&self.brain);
                async move {
                    if item.embedding.is_empty() {
                        let text = format!("{} {}", item.title, item.summary);
                        item.embedding = brain.embed(&text).await?;
                    }
                    Ok(item)
                }
            })
            .collect();

        let embedded: Vec<HydratedItem> = run_bounded(EMBEDDING_CONCURRENCY, tasks)
            .await
            .into_iter()
            .flatten()
            .collect();

        ctx.check_cancelled()?;
        Ok(embedded)
    }
}
