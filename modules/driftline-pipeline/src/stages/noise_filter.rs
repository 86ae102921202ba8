//! Stage 3: editorial noise filter. Drops items whose titles match the
//! promotional-content blocklist.

use async_trait::async_trait;
use regex::RegexSet;
use tracing::debug;

use driftline_common::{DiscoveredItem, DriftlineError};

use crate::params::ControlParams;
use crate::stages::{RunContext, Stage};

const NOISE_PATTERNS: &[&str] = &[
    r"(?i)\bsponsored\b",
    r"(?i)\badvertisement\b",
    r"(?i)\bpromoted\b",
    r"(?i)\bnewsletter\b",
    r"(?i)\bdigest\b",
    r"(?i)\bdaily briefing\b",
    r"(?i)\bweekly roundup\b",
];

pub struct NoiseFilterStage {
    patterns: RegexSet,
}

impl NoiseFilterStage {
    pub fn new() -> Self {
        // Patterns are static and known-valid.
        let patterns = RegexSet::new(NOISE_PATTERNS).expect("noise patterns compile");
        Self { patterns }
    }
}

impl Default for NoiseFilterStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage<Vec<DiscoveredItem>, Vec<DiscoveredItem>> for NoiseFilterStage {
    fn name(&self) -> &'static str {
        "noise_filter"
    }

    async fn run(
        &self,
        items: Vec<DiscoveredItem>,
        _params: &ControlParams,
        ctx: &RunContext,
    ) -> Result<Vec<DiscoveredItem>, DriftlineError> {
        ctx.check_cancelled()?;
        let before = items.len();
        let kept: Vec<DiscoveredItem> = items
            .into_iter()
            .filter(|item| !self.patterns.is_match(&item.title))
            .collect();
        debug!(before, after = kept.len(), "Noise filter");
        Ok(kept)
    }
}
