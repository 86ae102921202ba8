use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Request / Response Types
// =============================================================================

/// A (title, snippet) pair submitted for triage ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankCandidate {
    pub title: String,
    pub snippet: String,
}

/// Topics, entities, and a short summary extracted from raw text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Normalization {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// Cross-referencing verdict for a group of near-duplicate items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrutinyReport {
    #[serde(default = "default_integrity")]
    pub integrity_score: f32,
    #[serde(default)]
    pub is_controversial: bool,
    #[serde(default)]
    pub conflict_points: Vec<String>,
}

fn default_integrity() -> f32 {
    100.0
}

impl Default for ScrutinyReport {
    fn default() -> Self {
        Self {
            integrity_score: 100.0,
            is_controversial: false,
            conflict_points: Vec::new(),
        }
    }
}

/// One member item of a cluster, reduced to what synthesis prompts need.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisItem {
    pub source: String,
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Brief,
    Detailed,
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub items: Vec<SynthesisItem>,
    pub persona: String,
    pub detail: DetailLevel,
}

/// Editorial output for one cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Synthesis {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default, rename = "whyItMatters")]
    pub why_it_matters: String,
}

/// A ranked cluster reduced for the run-level global synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterDigest {
    pub title: String,
    pub narrative: String,
    pub category: String,
}

/// Run-level editorial brief spanning all top clusters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSummary {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub content: String,
}

// =============================================================================
// Brain Trait
// =============================================================================

/// The narrow capability contract through which the pipeline consumes its
/// generative/analytical provider.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Score each candidate 0-100 against the caller's interest weights.
    /// The output is in candidate order and has the same length.
    async fn rank(
        &self,
        items: &[RankCandidate],
        interests: &HashMap<String, f32>,
    ) -> Result<Vec<f32>>;

    /// Extract topics, entities, and a summary from raw text.
    async fn normalize(&self, text: &str) -> Result<Normalization>;

    /// Cross-reference a near-duplicate group for factual conflicts.
    async fn scrutinize(&self, items: &[SynthesisItem]) -> Result<ScrutinyReport>;

    /// Embed a short text into a fixed-dimension normalized vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Produce an editorial narrative for one cluster.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis>;

    /// Produce the run-level brief across the top clusters.
    async fn synthesize_global(
        &self,
        clusters: &[ClusterDigest],
        persona: &str,
    ) -> Result<GlobalSummary>;
}
