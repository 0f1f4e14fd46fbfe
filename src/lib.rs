//! Compass Analytics - configuration-driven analytics for behavioral tracking data
//!
//! Compass turns emotion, sensory and tracking-session observations into
//! patterns, correlations, anomalies and predictive insights. Results are
//! cached by a fingerprint of the data and the configuration each operation
//! reads, and a background worker streams them stage by stage:
//! patterns → correlations → predictive insights → anomalies → complete.
//!
//! ## Modules
//!
//! - **Analysis**: pure statistical operations over a configuration snapshot
//! - **Cache**: TTL and size bounded result cache with tag invalidation
//! - **Pipeline / Worker**: staged orchestration with batched message output

pub mod analysis;
pub mod cache;
pub mod cached;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod messages;
pub mod normalizer;
pub mod pipeline;
pub mod stats;
pub mod types;
pub mod window;
pub mod worker;

pub use analysis::{Analyzer, EmotionForecast, EmotionPredictor};
pub use cache::{CacheEngine, CacheStats};
pub use cached::CachedAnalysis;
pub use config::{
    merge_config, validate_config, AnalyticsConfiguration, ConfigPreset, ConfigStore,
    ValidatedConfig,
};
pub use error::{AnalyticsError, AnalyticsResult};
pub use messages::{CacheCommand, TaskRequest, WorkerRequest, WorkerResponse};
pub use normalizer::Normalizer;
pub use pipeline::{AnalyticsProcessor, Outbox, PipelineStage};
pub use types::{AnalyticsInputs, AnalyticsResults};
pub use window::{DateRange, RangePreset};
pub use worker::{AnalyticsWorker, WorkerHandle};

/// Compass version reported by the CLI
pub const COMPASS_VERSION: &str = env!("CARGO_PKG_VERSION");
