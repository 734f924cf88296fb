pub mod tracker;

pub use tracker::{
    CollectSummary, DiscoverySummary, RefreshSummary, TokenTracker, TrackerSettings,
};
