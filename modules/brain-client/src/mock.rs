//! Deterministic in-process [`Brain`] for tests and offline development.
//! No network, no randomness: identical inputs always produce identical
//! outputs, so pipeline tests stay reproducible.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::traits::*;

const EMBED_DIM: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct MockBrain;

impl MockBrain {
    pub fn new() -> Self {
        Self
    }
}

fn fold_hash(text: &str) -> u64 {
    let mut hash: u64 = 0;
    for b in text.bytes() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(b as u64);
    }
    hash
}

/// SplitMix64 finalizer. Gives each (text, dimension) pair an independent
/// pseudo-random value so unrelated texts land near-orthogonal.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[async_trait]
impl Brain for MockBrain {
    /// Baseline 50, boosted when the title mentions an interest with weight
    /// above 50, penalized for interests weighted below 50.
    async fn rank(
        &self,
        items: &[RankCandidate],
        interests: &HashMap<String, f32>,
    ) -> Result<Vec<f32>> {
        Ok(items
            .iter()
            .map(|item| {
                let haystack = format!("{} {}", item.title, item.snippet).to_lowercase();
                let mut score = 50.0f32;
                for (topic, weight) in interests {
                    if haystack.contains(&topic.to_lowercase()) {
                        score += (weight - 50.0) * 0.6;
                    }
                }
                score.clamp(0.0, 100.0)
            })
            .collect())
    }

    async fn normalize(&self, text: &str) -> Result<Normalization> {
        let upper = text.to_uppercase();
        let topics = if upper.contains("AI") || upper.contains("GPU") || upper.contains("MODEL") {
            vec!["TECH".to_string()]
        } else {
            vec!["GENERAL".to_string()]
        };
        let entities = text
            .split_whitespace()
            .filter(|w| w.len() > 1 && w.chars().next().is_some_and(|c| c.is_uppercase()))
            .take(5)
            .map(str::to_string)
            .collect();
        let summary: String = text.chars().take(200).collect();
        Ok(Normalization {
            topics,
            entities,
            summary,
        })
    }

    async fn scrutinize(&self, _items: &[SynthesisItem]) -> Result<ScrutinyReport> {
        Ok(ScrutinyReport {
            integrity_score: 94.0,
            is_controversial: false,
            conflict_points: Vec::new(),
        })
    }

    /// Deterministic embedding: hash-seeded pseudo-random values,
    /// L2-normalized. Identical texts have cosine 1.0; unrelated texts land
    /// near-orthogonal.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = fold_hash(text);
        let raw: Vec<f32> = (0..EMBED_DIM)
            .map(|i| {
                let bits = mix(hash.wrapping_add((i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)));
                (bits as i64 as f64 / i64::MAX as f64) as f32
            })
            .collect();
        let mag = raw.iter().map(|v| v * v).sum::<f32>().sqrt().max(f32::EPSILON);
        Ok(raw.into_iter().map(|v| v / mag).collect())
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis> {
        let lead = request
            .items
            .first()
            .map(|i| i.title.clone())
            .unwrap_or_default();
        let narrative = request
            .items
            .iter()
            .map(|i| format!("- {}", i.summary))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Synthesis {
            title: format!("Briefing: {lead}"),
            narrative,
            why_it_matters: format!(
                "Corroborated by {} independent signals.",
                request.items.len()
            ),
        })
    }

    async fn synthesize_global(
        &self,
        clusters: &[ClusterDigest],
        _persona: &str,
    ) -> Result<GlobalSummary> {
        Ok(GlobalSummary {
            headline: clusters
                .first()
                .map(|c| c.title.clone())
                .unwrap_or_else(|| "Quiet day".to_string()),
            content: format!("{} stories tracked today.", clusters.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic_and_normalized() {
        let brain = MockBrain::new();
        let a = brain.embed("hello world").await.unwrap();
        let b = brain.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        let mag: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn embeddings_of_different_texts_diverge() {
        let brain = MockBrain::new();
        let a = brain.embed("openai releases new frontier model").await.unwrap();
        let b = brain.embed("sourdough hydration ratios explained").await.unwrap();
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!(dot < 0.8, "unrelated texts should not look semantically identical: {dot}");
    }

    #[tokio::test]
    async fn rank_boosts_matching_interests() {
        let brain = MockBrain::new();
        let items = vec![
            RankCandidate {
                title: "New GPU architecture announced".into(),
                snippet: String::new(),
            },
            RankCandidate {
                title: "Weather today".into(),
                snippet: String::new(),
            },
        ];
        let mut interests = HashMap::new();
        interests.insert("GPU".to_string(), 90.0);
        let scores = brain.rank(&items, &interests).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn rank_output_matches_input_order_and_length() {
        let brain = MockBrain::new();
        let items: Vec<_> = (0..7)
            .map(|i| RankCandidate {
                title: format!("item {i}"),
                snippet: String::new(),
            })
            .collect();
        let scores = brain.rank(&items, &HashMap::new()).await.unwrap();
        assert_eq!(scores.len(), 7);
        assert!(scores.iter().all(|s| (*s - 50.0).abs() < f32::EPSILON));
    }
}
