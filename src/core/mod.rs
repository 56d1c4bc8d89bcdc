pub mod engine;
pub mod orchestrator;
pub mod recorder;

pub use crate::domain::model::{
    Document, FetchOutcome, MeasurementConfig, NodeStatus, TimingEvent, TraversalNode,
};
pub use crate::domain::ports::{ConfigProvider, DocumentFetcher, Resolver, TwinClient};
pub use crate::utils::error::Result;
pub use engine::{BatchSettings, FanOut, TraversalEngine};
pub use orchestrator::BatchOrchestrator;
pub use recorder::TimingRecorder;
