pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::DriftlineError;
pub use types::{
    AddResult, Category, DailySummary, DiscoveredItem, FeedStatus, HydratedItem, InterestWeights,
    Scrutiny, SourceDescriptor, SourceKind, StoryCluster, TrendIndicator,
};
