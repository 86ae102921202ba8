//! Run orchestration. Owns all cross-run state (cache, seen URLs,
//! cancellation) and drives the stages strictly in order, emitting a
//! progress event after each.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use brain_client::{Brain, ClusterDigest};
use driftline_common::{
    DailySummary, DiscoveredItem, DriftlineError, HydratedItem, SourceDescriptor, SourceKind,
    StoryCluster,
};

use crate::connector::Connector;
use crate::params::ControlParams;
use crate::repository::Repository;
use crate::stages::hydration::HydrationInput;
use crate::stages::{
    ClusteringStage, DiscoveryStage, EmbeddingStage, HydrationStage, NoiseFilterStage,
    PersistenceStage, ProgressEvent, RunContext, ScoringStage, SemanticDedupStage, Stage,
    SynthesisStage, TriageStage, UrlDedupStage,
};

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub clusters: Vec<StoryCluster>,
    pub daily_summary: Option<DailySummary>,
    /// True when the discovery half was skipped and items came from the
    /// previous run's cache.
    pub served_from_cache: bool,
}

struct CachedItems {
    items: Vec<HydratedItem>,
    at: Instant,
}

/// One orchestrator serves one caller; runs are not meant to overlap.
pub struct Orchestrator {
    discovery: DiscoveryStage,
    url_dedup: UrlDedupStage,
    noise_filter: NoiseFilterStage,
    triage: TriageStage,
    hydration: HydrationStage,
    embedding: EmbeddingStage,
    semantic_dedup: SemanticDedupStage,
    clustering: ClusteringStage,
    synthesis: SynthesisStage,
    scoring: ScoringStage,
    persistence: PersistenceStage,

    brain: Arc<dyn Brain>,
    repository: Arc<dyn Repository>,
    cache: Mutex<Option<CachedItems>>,
    seen_urls: Mutex<HashSet<String>>,
    cancelled: Arc<AtomicBool>,
    progress: Mutex<Option<mpsc::UnboundedSender<ProgressEvent>>>,
}

impl Orchestrator {
    pub fn new(
        connectors: HashMap<SourceKind, Arc<dyn Connector>>,
        brain: Arc<dyn Brain>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        let connectors = Arc::new(connectors);
        Self {
            discovery: DiscoveryStage::new(Arc::clone(&connectors)),
            url_dedup: UrlDedupStage,
            noise_filter: NoiseFilterStage::new(),
            triage: TriageStage::new(Arc::clone(&brain)),
            hydration: HydrationStage::new(connectors),
            embedding: EmbeddingStage::new(Arc::clone(&brain)),
            semantic_dedup: SemanticDedupStage::new(Arc::clone(&brain)),
            clustering: ClusteringStage,
            synthesis: SynthesisStage::new(Arc::clone(&brain)),
            scoring: ScoringStage,
            persistence: PersistenceStage,
            brain,
            repository,
            cache: Mutex::new(None),
            seen_urls: Mutex::new(HashSet::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: Mutex::new(None),
        }
    }

    /// Attach a progress listener. Replaces any previous one.
    pub fn subscribe_progress(&self) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.progress.lock().unwrap() = Some(tx);
        rx
    }

    /// Request cancellation of the in-flight run. The run aborts at the
    /// next stage entry or batch boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Execute a full run under the whole-run safety timeout.
    pub async fn run(
        &self,
        sources: Vec<SourceDescriptor>,
        params: ControlParams,
        force_refresh: bool,
    ) -> Result<PipelineRun, DriftlineError> {
        self.cancelled.store(false, Ordering::SeqCst);
        let timeout = Duration::from_secs(params.run_timeout_secs);
        match tokio::time::timeout(timeout, self.run_inner(sources, &params, force_refresh)).await
        {
            Ok(result) => result,
            Err(_) => Err(DriftlineError::Timeout(params.run_timeout_secs)),
        }
    }

    async fn run_inner(
        &self,
        sources: Vec<SourceDescriptor>,
        params: &ControlParams,
        force_refresh: bool,
    ) -> Result<PipelineRun, DriftlineError> {
        let ctx = RunContext::new(
            Arc::clone(&self.repository),
            self.seen_urls.lock().unwrap().clone(),
            Arc::clone(&self.cancelled),
            self.progress.lock().unwrap().clone(),
        );
        info!(run_id = %ctx.run_id, force_refresh, sources = sources.len(), "Run started");

        let (items, served_from_cache) = if !force_refresh {
            if let Some(cached) = self.cached_items(params, &sources) {
                info!(run_id = %ctx.run_id, items = cached.len(), "Serving from warm cache");
                (cached, true)
            } else {
                self.ingest(&sources, params, &ctx).await?
            }
        } else {
            self.ingest(&sources, params, &ctx).await?
        };

        let n = items.len();
        let clusters = self
            .run_stage(&self.clustering, items, n, Vec::len, params, &ctx)
            .await?;
        let n = clusters.len();
        let clusters = self
            .run_stage(&self.synthesis, clusters, n, Vec::len, params, &ctx)
            .await?;
        let n = clusters.len();
        let clusters = self
            .run_stage(&self.scoring, clusters, n, Vec::len, params, &ctx)
            .await?;
        let n = clusters.len();
        let clusters = self
            .run_stage(&self.persistence, clusters, n, Vec::len, params, &ctx)
            .await?;

        let daily_summary = self.global_summary(&clusters, params).await;

        info!(run_id = %ctx.run_id, clusters = clusters.len(), served_from_cache, "Run complete");
        Ok(PipelineRun {
            run_id: ctx.run_id,
            clusters,
            daily_summary,
            served_from_cache,
        })
    }

    /// Stages 1-7: discovery through semantic dedup, plus cache merge and
    /// seen-URL bookkeeping.
    async fn ingest(
        &self,
        sources: &[SourceDescriptor],
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<(Vec<HydratedItem>, bool), DriftlineError> {
        let discovered = self
            .run_stage(&self.discovery, sources.to_vec(), sources.len(), Vec::len, params, ctx)
            .await?;

        let n = discovered.len();
        let fresh = self
            .run_stage(&self.url_dedup, discovered, n, Vec::len, params, ctx)
            .await?;
        self.remember_urls(&fresh).await?;

        let n = fresh.len();
        let quiet = self
            .run_stage(&self.noise_filter, fresh, n, Vec::len, params, ctx)
            .await?;
        let n = quiet.len();
        let triaged = self
            .run_stage(&self.triage, quiet, n, Vec::len, params, ctx)
            .await?;

        if triaged.is_empty() {
            // Zero new items and a warm cache: serve the previous run's
            // items rather than an empty result.
            if let Some(previous) = self.cached_items(params, sources) {
                if !previous.is_empty() {
                    info!(run_id = %ctx.run_id, "No new items, serving previous run");
                    return Ok((previous, true));
                }
            }
        }

        let n = triaged.len();
        let hydrated = self
            .run_stage(
                &self.hydration,
                HydrationInput {
                    items: triaged,
                    sources: sources.to_vec(),
                },
                n,
                Vec::len,
                params,
                ctx,
            )
            .await?;

        let n = hydrated.len();
        let embedded = self
            .run_stage(&self.embedding, hydrated, n, Vec::len, params, ctx)
            .await?;

        let merged = self.merge_with_cache(embedded, sources);

        let n = merged.len();
        let survivors = self
            .run_stage(&self.semantic_dedup, merged, n, Vec::len, params, ctx)
            .await?;

        *self.cache.lock().unwrap() = Some(CachedItems {
            items: survivors.clone(),
            at: Instant::now(),
        });
        Ok((survivors, false))
    }

    /// Cached items, only if the cache is fresher than the TTL. Items from
    /// sources that are no longer active are filtered out.
    fn cached_items(
        &self,
        params: &ControlParams,
        sources: &[SourceDescriptor],
    ) -> Option<Vec<HydratedItem>> {
        let cache = self.cache.lock().unwrap();
        let cached = cache.as_ref()?;
        let ttl = Duration::from_secs(params.cache_ttl_minutes.max(0) as u64 * 60);
        if cached.at.elapsed() >= ttl {
            return None;
        }
        Some(filter_active(&cached.items, sources))
    }

    /// New items plus cached items from still-active sources, deduplicated
    /// by id with new items winning.
    fn merge_with_cache(
        &self,
        new_items: Vec<HydratedItem>,
        sources: &[SourceDescriptor],
    ) -> Vec<HydratedItem> {
        let cache = self.cache.lock().unwrap();
        let Some(cached) = cache.as_ref() else {
            return new_items;
        };

        let mut ids: HashSet<String> = new_items.iter().map(|i| i.id.clone()).collect();
        let mut merged = new_items;
        for item in filter_active(&cached.items, sources) {
            if ids.insert(item.id.clone()) {
                merged.push(item);
            }
        }
        merged
    }

    async fn remember_urls(&self, items: &[DiscoveredItem]) -> Result<(), DriftlineError> {
        if items.is_empty() {
            return Ok(());
        }
        self.repository
            .persist_raw_items(items)
            .await
            .map_err(DriftlineError::Anyhow)?;
        let mut seen = self.seen_urls.lock().unwrap();
        for item in items {
            seen.insert(item.url.clone());
        }
        Ok(())
    }

    /// Run-level brief over the top clusters. Failure degrades to no
    /// summary; the clusters themselves still ship.
    async fn global_summary(
        &self,
        clusters: &[StoryCluster],
        params: &ControlParams,
    ) -> Option<DailySummary> {
        if clusters.is_empty() {
            return None;
        }
        let digests: Vec<ClusterDigest> = clusters
            .iter()
            .take(params.max_synthesis_clusters)
            .map(|c| ClusterDigest {
                title: c.title.clone(),
                narrative: c.narrative.clone(),
                category: format!("{:?}", c.category),
            })
            .collect();

        match self
            .brain
            .synthesize_global(&digests, &params.synthesis_persona)
            .await
        {
            Ok(summary) => {
                let daily = DailySummary {
                    headline: summary.headline,
                    content: summary.content,
                };
                if let Err(e) = self.repository.save_daily_summary(&daily).await {
                    warn!(error = %e, "Failed to persist daily summary");
                }
                Some(daily)
            }
            Err(e) => {
                warn!(error = %e, "Global synthesis failed");
                None
            }
        }
    }

    async fn run_stage<I, O, S>(
        &self,
        stage: &S,
        input: I,
        items_in: usize,
        count_out: fn(&O) -> usize,
        params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<O, DriftlineError>
    where
        S: Stage<I, O>,
        I: Send,
        O: Send,
    {
        let started = Instant::now();
        let output = stage.run(input, params, ctx).await?;
        ctx.emit(ProgressEvent {
            run_id: ctx.run_id,
            stage: stage.name(),
            duration_ms: started.elapsed().as_millis() as u64,
            items_in,
            items_out: count_out(&output),
        });
        Ok(output)
    }
}

fn filter_active(items: &[HydratedItem], sources: &[SourceDescriptor]) -> Vec<HydratedItem> {
    let active: HashSet<Uuid> = sources.iter().filter(|s| s.active).map(|s| s.id).collect();
    items
        .iter()
        .filter(|i| active.contains(&i.source_id))
        .cloned()
        .collect()
}
