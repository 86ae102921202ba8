//! Pipeline stages. Each stage is a narrowing typed transform; the
//! orchestrator runs them strictly in sequence and emits a progress event
//! after each one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use driftline_common::DriftlineError;

use crate::params::ControlParams;
use crate::repository::Repository;

pub mod clustering;
pub mod discovery;
pub mod embedding;
pub mod hydration;
pub mod noise_filter;
pub mod persistence;
pub mod scoring;
pub mod semantic_dedup;
pub mod synthesis;
pub mod triage;
pub mod url_dedup;

pub use clustering::ClusteringStage;
pub use discovery::DiscoveryStage;
pub use embedding::EmbeddingStage;
pub use hydration::HydrationStage;
pub use noise_filter::NoiseFilterStage;
pub use persistence::PersistenceStage;
pub use scoring::ScoringStage;
pub use semantic_dedup::SemanticDedupStage;
pub use synthesis::SynthesisStage;
pub use triage::TriageStage;
pub use url_dedup::UrlDedupStage;

/// Emitted after every completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub stage: &'static str,
    pub duration_ms: u64,
    pub items_in: usize,
    pub items_out: usize,
}

/// Per-run shared state handed to every stage.
pub struct RunContext {
    pub run_id: Uuid,
    pub repository: Arc<dyn Repository>,
    /// URLs already processed in previous runs of this orchestrator.
    pub seen_urls: HashSet<String>,
    cancelled: Arc<AtomicBool>,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl RunContext {
    pub fn new(
        repository: Arc<dyn Repository>,
        seen_urls: HashSet<String>,
        cancelled: Arc<AtomicBool>,
        progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            repository,
            seen_urls,
            cancelled,
            progress,
        }
    }

    /// Checked at every stage entry and at fan-out batch boundaries.
    pub fn check_cancelled(&self) -> Result<(), DriftlineError> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(DriftlineError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Send a progress event to the sink (if attached) and mirror it to
    /// the log. A dropped receiver is not an error.
    pub fn emit(&self, event: ProgressEvent) {
        info!(
            run_id = %event.run_id,
            stage = event.stage,
            duration_ms = event.duration_ms,
            items_in = event.items_in,
            items_out = event.items_out,
            "Stage complete"
        );
        if let Some(sink) = &self.progress {
            let _ = sink.send(event);
        }
    }
}

/// A typed pipeline stage. Stages never mutate shared state directly;
/// everything they need arrives through the input, params, and context.
#[async_trait]
pub trait Stage<I, O>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        input: I,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<O, DriftlineError>;
}
