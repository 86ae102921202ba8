//! Content ingestion and deduplication pipeline: a staged funnel that
//! discovers items from configured sources, filters and deduplicates them
//! across four independent layers, enriches the survivors, and groups them
//! into ranked story clusters.

pub mod connector;
pub mod dedup;
pub mod orchestrator;
pub mod params;
pub mod repository;
pub mod runner;
pub mod scheduling;
pub mod similarity;
pub mod stages;
pub mod store;
pub mod testing;

pub use connector::Connector;
pub use dedup::{DedupCheck, DedupIndex, DedupReason};
pub use orchestrator::{Orchestrator, PipelineRun};
pub use params::{ClusteringAlgorithm, ControlParams};
pub use repository::{InMemoryRepository, Repository};
pub use runner::run_bounded;
pub use scheduling::{FeedConfig, FeedFetch, FeedFetcher, FeedScheduler, ItemSink};
pub use stages::{ProgressEvent, RunContext, Stage};
pub use store::{ItemStore, StoreStats};
