//! Per-run control parameters. Built once per run and passed immutably
//! through every stage call.

use brain_client::DetailLevel;
use driftline_common::types::InterestWeights;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringAlgorithm {
    /// Greedy single-pass density grouping. O(n²), bounded by the hydration cap.
    Greedy,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ControlParams {
    /// How far back discovery looks, and the seen-URL window.
    #[builder(default = 24)]
    pub discovery_window_hours: i64,

    #[builder(default = 50)]
    pub max_items_per_source: usize,

    /// 0-1; reserved knob for connector-level noise heuristics.
    #[builder(default = 0.3)]
    pub noise_threshold: f32,

    /// Items scoring below this combined score are not hydrated.
    #[builder(default = 60.0)]
    pub min_interest_score: f32,

    /// Hard cap on hydration fan-out. The cost/latency control valve:
    /// enforced even when more items clear the threshold.
    #[builder(default = 40)]
    pub max_hydration_limit: usize,

    #[builder(default = ClusteringAlgorithm::Greedy)]
    pub clustering_algorithm: ClusteringAlgorithm,

    /// Cosine threshold for "same story" grouping.
    #[builder(default = 0.85)]
    pub clustering_epsilon: f64,

    #[builder(default = 1)]
    pub min_cluster_size: usize,

    /// Cosine threshold for "treat as the same article" in semantic dedup.
    /// Deliberately stricter than `clustering_epsilon`.
    #[builder(default = 0.95)]
    pub semantic_dup_threshold: f64,

    #[builder(default = String::from("Neutral Analyst"))]
    pub synthesis_persona: String,

    #[builder(default = DetailLevel::Brief)]
    pub synthesis_detail: DetailLevel,

    /// Upper bound on per-cluster synthesis calls per run.
    #[builder(default = 12)]
    pub max_synthesis_clusters: usize,

    /// Soft-refresh window: a run starting within this many minutes of the
    /// previous one reuses its processed items.
    #[builder(default = 60)]
    pub cache_ttl_minutes: i64,

    /// Whole-run safety timeout, independent of per-call deadlines.
    #[builder(default = 600)]
    pub run_timeout_secs: u64,

    #[builder(default)]
    pub interests: InterestWeights,
}

impl Default for ControlParams {
    fn default() -> Self {
        ControlParams::builder().build()
    }
}
