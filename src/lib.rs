pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::HttpTwinClient;
pub use app::{MeasurementRunner, SuiteReport};
pub use config::MeasureConfig;
pub use self::core::{BatchOrchestrator, FanOut, TimingRecorder, TraversalEngine};
pub use utils::error::{MeasureError, Result};
