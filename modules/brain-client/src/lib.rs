//! Provider-agnostic client for the generative/analytical capabilities the
//! ingestion pipeline consumes: ranking, normalization, scrutiny, embedding,
//! and synthesis. Callers are expected to degrade gracefully when any call
//! fails — this crate never invents neutral defaults on its own.

pub mod extract;
pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockBrain;
pub use openai::OpenAiBrain;
pub use traits::{
    Brain, ClusterDigest, DetailLevel, GlobalSummary, Normalization, RankCandidate,
    ScrutinyReport, Synthesis, SynthesisItem, SynthesisRequest,
};
