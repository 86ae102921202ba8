//! Deduplication index: answers "have we already seen this item" using two
//! independent signals — normalized-title similarity and a 64-bit content
//! fingerprint — each tagged with the item's publish date so the index can
//! be pruned on a retention window.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use driftline_common::{DiscoveredItem, DriftlineError};

use crate::similarity;

const HAMMING_THRESHOLD: u32 = 3;
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.9;
/// Titles shorter than this (after normalization) are too ambiguous for the
/// similarity signal and skip straight to the fingerprint check.
const MIN_TITLE_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupReason {
    TitleSimilarity,
    ContentFingerprint,
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Serialize)]
pub struct DedupCheck {
    pub is_duplicate: bool,
    /// 0 to 1. Title matches report the similarity score; fingerprint
    /// matches report `1 - distance/64`.
    pub confidence: f64,
    pub reason: Option<DedupReason>,
    pub original_id: Option<String>,
}

impl DedupCheck {
    fn miss() -> Self {
        Self {
            is_duplicate: false,
            confidence: 0.0,
            reason: None,
            original_id: None,
        }
    }
}

struct TitleEntry {
    normalized: String,
    published_at: DateTime<Utc>,
}

struct FingerprintEntry {
    hash: u64,
    published_at: DateTime<Utc>,
}

/// In-memory duplicate index. Single-writer-at-a-time semantics: callers
/// serialize `index`/`prune` externally (the orchestrator owns this).
#[derive(Default)]
pub struct DedupIndex {
    titles: HashMap<String, TitleEntry>,
    fingerprints: HashMap<String, FingerprintEntry>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check an item against the index. The title signal is evaluated first
    /// so a positive match avoids the fingerprint scan entirely.
    ///
    /// A missing title is a contract violation, not a recoverable condition.
    pub fn check(&self, item: &DiscoveredItem) -> Result<DedupCheck, DriftlineError> {
        if item.title.trim().is_empty() {
            return Err(DriftlineError::Validation(
                "item title is required for deduplication".to_string(),
            ));
        }

        // 1. Title similarity
        let normalized = similarity::normalize(&item.title);
        if normalized.chars().count() >= MIN_TITLE_LENGTH {
            for (id, entry) in &self.titles {
                let score = similarity::similarity(&normalized, &entry.normalized);
                if score >= TITLE_SIMILARITY_THRESHOLD {
                    debug!(id, score, "Title similarity match");
                    return Ok(DedupCheck {
                        is_duplicate: true,
                        confidence: score,
                        reason: Some(DedupReason::TitleSimilarity),
                        original_id: Some(id.clone()),
                    });
                }
            }
        }

        // 2. Content fingerprint
        let hash = similarity::simhash(Self::hashable_content(item));
        if hash != 0 {
            for (id, entry) in &self.fingerprints {
                let distance = similarity::hamming(hash, entry.hash);
                if distance <= HAMMING_THRESHOLD {
                    debug!(id, distance, "Fingerprint match");
                    return Ok(DedupCheck {
                        is_duplicate: true,
                        confidence: 1.0 - distance as f64 / 64.0,
                        reason: Some(DedupReason::ContentFingerprint),
                        original_id: Some(id.clone()),
                    });
                }
            }
        }

        Ok(DedupCheck::miss())
    }

    /// Record both signals for an item under the given origin id. The
    /// fingerprint is only stored when computable; the title always is.
    pub fn index(&mut self, item: &DiscoveredItem, id: &str) -> Result<(), DriftlineError> {
        if id.is_empty() {
            return Err(DriftlineError::Validation(
                "id is required for indexing".to_string(),
            ));
        }

        let published_at = item.published_at;

        self.titles.insert(
            id.to_string(),
            TitleEntry {
                normalized: similarity::normalize(&item.title),
                published_at,
            },
        );

        let hash = similarity::simhash(Self::hashable_content(item));
        if hash != 0 {
            self.fingerprints
                .insert(id.to_string(), FingerprintEntry { hash, published_at });
        }

        Ok(())
    }

    /// Evict entries whose publish date is strictly older than
    /// `now - max_age_days`, independently for each signal store. Entries
    /// exactly at the boundary are retained.
    pub fn prune(&mut self, max_age_days: i64) -> Result<(), DriftlineError> {
        if max_age_days <= 0 {
            return Err(DriftlineError::Validation(
                "max_age_days must be greater than zero".to_string(),
            ));
        }

        let cutoff = Utc::now() - Duration::days(max_age_days);
        let titles_before = self.titles.len();
        let hashes_before = self.fingerprints.len();

        self.titles.retain(|_, e| e.published_at >= cutoff);
        self.fingerprints.retain(|_, e| e.published_at >= cutoff);

        debug!(
            titles_pruned = titles_before - self.titles.len(),
            hashes_pruned = hashes_before - self.fingerprints.len(),
            max_age_days,
            "Dedup index pruned"
        );
        Ok(())
    }

    pub fn clear(&mut self) {
        self.titles.clear();
        self.fingerprints.clear();
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Fallback chain for the fingerprint input: snippet, then title.
    fn hashable_content(item: &DiscoveredItem) -> &str {
        if item.snippet.trim().is_empty() {
            &item.title
        } else {
            &item.snippet
        }
    }
}
