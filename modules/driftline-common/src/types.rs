//! Core domain types shared across the ingestion pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of upstream a source descriptor points at. Determines which
/// connector implementation handles discovery and hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rss,
    Reddit,
    X,
    Youtube,
    Github,
    Medium,
    Arxiv,
}

/// A configured content source. Created and edited by configuration,
/// read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: Uuid,
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    pub active: bool,
    /// Editorial trust in this source, 0-100. Feeds the initial
    /// priority of everything it discovers.
    pub signal_score: Option<f32>,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            url: url.into(),
            active: true,
            signal_score: None,
        }
    }
}

/// Lightweight pointer produced by discovery. The URL is the natural key
/// for exact-duplicate detection within and across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Raw content snippet as the connector found it (often truncated).
    pub snippet: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Mutable priority score, seeded from the source's signal score and
    /// re-weighted by triage.
    pub priority: f32,
    // Provenance, carried through every later stage.
    pub source_id: Uuid,
    pub source_name: String,
    pub source_kind: SourceKind,
}

/// Scrutiny record attached by the semantic-dedup stage when the Brain
/// cross-references a near-duplicate group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scrutiny {
    pub integrity_score: f32,
    pub is_controversial: bool,
    pub conflict_points: Vec<String>,
    pub flags: Vec<String>,
}

/// Broad editorial category for a hydrated item or cluster. Drives the
/// relevance lookup and the temporal-decay constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Tech,
    Politics,
    Philosophy,
    Music,
    Cooking,
    #[default]
    General,
}

impl Category {
    /// Map a free-form topic label (as emitted by the Brain) to a category.
    pub fn from_topic(topic: &str) -> Self {
        match topic.to_ascii_uppercase().as_str() {
            "TECH" | "SCIENCE" | "AI" => Category::Tech,
            "POLITICS" | "GEOPOLITICS" => Category::Politics,
            "PHILOSOPHY" => Category::Philosophy,
            "MUSIC" => Category::Music,
            "COOKING" | "FOOD" => Category::Cooking,
            _ => Category::General,
        }
    }
}

/// Caller interest weights per category, 0-100.
pub type InterestWeights = HashMap<Category, f32>;

/// A fully enriched item: full text, embedding vector, scrutiny record.
/// Created by hydration; the embedding is filled by the embedding stage;
/// not mutated after clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    /// 2-3 sentence summary used for ranking and embedding.
    pub summary: String,
    pub full_text: Option<String>,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub priority: f32,
    pub topics: Vec<String>,
    pub entities: Vec<String>,
    pub category: Category,
    /// Fixed-dimension semantic vector; empty until the embedding stage runs.
    pub embedding: Vec<f32>,
    pub scrutiny: Option<Scrutiny>,
    pub source_id: Uuid,
    pub source_name: String,
    pub source_kind: SourceKind,
}

impl HydratedItem {
    /// Carry a discovered item's identity forward without content enrichment.
    pub fn from_discovered(item: &DiscoveredItem) -> Self {
        Self {
            id: item.id.clone(),
            url: item.url.clone(),
            title: item.title.clone(),
            summary: item.snippet.clone(),
            full_text: None,
            image_url: item.image_url.clone(),
            published_at: item.published_at,
            fetched_at: Utc::now(),
            priority: item.priority,
            topics: Vec::new(),
            entities: Vec::new(),
            category: Category::General,
            embedding: Vec::new(),
            scrutiny: None,
            source_id: item.source_id,
            source_name: item.source_name.clone(),
            source_kind: item.source_kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendIndicator {
    Rising,
    Stable,
    New,
}

/// A set of hydrated items judged to describe the same real-world story,
/// plus derived editorial fields. Membership is immutable after clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryCluster {
    pub id: String,
    pub title: String,
    pub narrative: String,
    pub why_it_matters: String,
    pub items: Vec<HydratedItem>,
    pub momentum_score: f32,
    pub relevance_score: f32,
    pub final_rank: f32,
    pub category: Category,
    pub trend: TrendIndicator,
}

impl StoryCluster {
    /// A fresh cluster seeded from its first member. Derived fields start
    /// neutral and are filled by synthesis and scoring.
    pub fn seed(items: Vec<HydratedItem>) -> Self {
        let first = &items[0];
        Self {
            id: format!("cluster-{}", first.id),
            title: first.title.clone(),
            narrative: String::new(),
            why_it_matters: String::new(),
            category: first.category,
            momentum_score: 0.0,
            relevance_score: 0.0,
            final_rank: 0.0,
            trend: TrendIndicator::New,
            items,
        }
    }

    /// Publish time of the freshest member.
    pub fn freshest_published_at(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|i| i.published_at).max()
    }
}

/// Run-level editorial brief produced by the Brain's global synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub headline: String,
    pub content: String,
}

/// Per-feed polling state. Mutated only by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedStatus {
    pub url: String,
    pub last_fetched: Option<DateTime<Utc>>,
    pub next_fetch: DateTime<Utc>,
    pub last_error: Option<String>,
    pub is_fetching: bool,
}

/// Outcome of adding a batch of items to the item store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResult {
    pub added: usize,
    pub skipped: usize,
}
