use crate::core::engine::{settle_branch, BatchSettings, FanOut, TraversalEngine};
use crate::core::recorder::TimingRecorder;
use crate::domain::model::{EventKind, EventTags, FetchOutcome, MeasurementConfig, TraversalNode};
use crate::domain::ports::TwinClient;
use crate::utils::error::Result;
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;

/// Runs one measurement batch over a list of DTIDs.
///
/// Every origin (network mode) or identifier (registry mode) runs in its own
/// task; results come back in input order regardless of completion order.
pub struct BatchOrchestrator<C> {
    client: Arc<C>,
    recorder: Arc<TimingRecorder>,
    fan_out: FanOut,
}

impl<C: TwinClient + 'static> BatchOrchestrator<C> {
    pub fn new(client: Arc<C>, recorder: Arc<TimingRecorder>) -> Self {
        Self {
            client,
            recorder,
            fan_out: FanOut::Concurrent,
        }
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    fn engine(&self, config: &MeasurementConfig) -> Arc<TraversalEngine<C>> {
        Arc::new(TraversalEngine::new(
            self.client.clone(),
            self.recorder.clone(),
            BatchSettings {
                resolve_timeout: config.resolve_timeout,
                fetch_timeout: config.fetch_timeout,
                sample_number: config.sample_number,
                fan_out: self.fan_out,
            },
        ))
    }

    /// Network mode: full child traversal from every origin.
    pub async fn run_network(&self, config: &MeasurementConfig) -> Result<Vec<TraversalNode>> {
        let engine = self.engine(config);
        let label = config.batch_label();
        Self::record_loop_start(&engine, &label)?;

        tracing::info!(
            "🌐 Sample {}: traversing {} origin(s)",
            config.sample_number,
            config.identifiers.len()
        );
        let loop_started = Instant::now();
        let tasks: Vec<_> = config
            .identifiers
            .iter()
            .map(|origin| {
                let traversal = engine.clone().traverse(origin.clone(), 0, origin.clone());
                tokio::spawn(traversal)
            })
            .collect();

        let mut roots = Vec::with_capacity(tasks.len());
        for (origin, joined) in config.identifiers.iter().zip(join_all(tasks).await) {
            roots.push(settle_branch(joined, origin.clone(), 0, origin)?);
        }

        engine.record(
            engine
                .event(label.as_str(), EventKind::NetworkLoopTotal { origins: roots.len() })
                .with_duration(loop_started.elapsed()),
        )?;
        engine.record(engine.event(label.as_str(), EventKind::LoopEnded))?;

        let nodes: usize = roots.iter().map(TraversalNode::node_count).sum();
        let failures: usize = roots.iter().map(TraversalNode::failure_count).sum();
        tracing::info!(
            "✅ Sample {}: {} nodes visited, {} failed, took {:?}",
            config.sample_number,
            nodes,
            failures,
            loop_started.elapsed()
        );

        Ok(roots)
    }

    /// Registry mode: flat resolve + fetch of every identifier, no recursion.
    pub async fn run_registry(&self, config: &MeasurementConfig) -> Result<Vec<FetchOutcome>> {
        let engine = self.engine(config);
        let label = config.batch_label();
        Self::record_loop_start(&engine, &label)?;

        tracing::info!(
            "📚 Sample {}: fetching {} DT doc(s)",
            config.sample_number,
            config.identifiers.len()
        );
        let loop_started = Instant::now();
        let tasks: Vec<_> = config
            .identifiers
            .iter()
            .map(|identifier| {
                let engine = engine.clone();
                let identifier = identifier.clone();
                tokio::spawn(async move {
                    let tags = EventTags::registry(&identifier);
                    engine.fetch_and_record(&identifier, &tags).await
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (identifier, joined) in config.identifiers.iter().zip(join_all(tasks).await) {
            let outcome = match joined {
                Ok(outcome) => outcome?,
                Err(e) => {
                    tracing::error!("Registry task for {} died: {}", identifier, e);
                    FetchOutcome::Aborted {
                        identifier: identifier.clone(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        engine.record(
            engine
                .event(
                    label.as_str(),
                    EventKind::RegistryLoopTotal {
                        documents: outcomes.len(),
                    },
                )
                .with_duration(loop_started.elapsed()),
        )?;
        engine.record(engine.event(label.as_str(), EventKind::LoopEnded))?;

        let fetched = outcomes.iter().filter(|o| o.document().is_some()).count();
        tracing::info!(
            "✅ Sample {}: {}/{} DT docs fetched, took {:?}",
            config.sample_number,
            fetched,
            outcomes.len(),
            loop_started.elapsed()
        );

        Ok(outcomes)
    }

    fn record_loop_start(engine: &TraversalEngine<C>, label: &str) -> Result<()> {
        engine.record(engine.event(label, EventKind::LoopStarted))?;
        let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        engine.record(engine.event("metadata", EventKind::StartedAt(started_at)))
    }
}
