use crate::core::recorder::TimingRecorder;
use crate::domain::model::{
    Document, EventKind, EventTags, FetchOutcome, Identifier, NodeStatus, TimingEvent,
    TraversalNode,
};
use crate::domain::ports::TwinClient;
use crate::domain::relations::extract_children;
use crate::utils::error::{MeasureError, Result};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;

/// How the children of one node are traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOut {
    /// One task per child, all joined before aggregation.
    #[default]
    Concurrent,
    /// Children one after another; used for comparison runs.
    Sequential,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub resolve_timeout: Duration,
    pub fetch_timeout: Duration,
    pub sample_number: u32,
    pub fan_out: FanOut,
}

/// Recursive resolve → fetch → extract → fan-out walk over the twin web.
///
/// One engine lives for exactly one batch: `started` is the batch baseline
/// for every `Time` value written to the timing log.
pub struct TraversalEngine<C> {
    client: Arc<C>,
    recorder: Arc<TimingRecorder>,
    settings: BatchSettings,
    started: Instant,
}

impl<C: TwinClient + 'static> TraversalEngine<C> {
    pub fn new(client: Arc<C>, recorder: Arc<TimingRecorder>, settings: BatchSettings) -> Self {
        Self {
            client,
            recorder,
            settings,
            started: Instant::now(),
        }
    }

    /// Event stamped with the time elapsed since the batch started.
    pub fn event(&self, identifier: impl Into<String>, kind: EventKind) -> TimingEvent {
        TimingEvent::new(
            self.started.elapsed(),
            identifier,
            kind,
            self.settings.sample_number,
        )
    }

    pub fn record(&self, event: TimingEvent) -> Result<()> {
        self.recorder.record(&event)
    }

    /// Resolves and fetches one DT doc, writing the hop rows.
    ///
    /// Node-local failures become `FetchOutcome` variants plus one failure
    /// row; only timing log failures are returned as errors.
    pub async fn fetch_and_record(&self, identifier: &str, tags: &EventTags) -> Result<FetchOutcome> {
        let hop_started = Instant::now();

        let hosting_location = match self.resolve(identifier).await {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!("Could not resolve DTID {}: {}", identifier, e);
                self.record(self.event(identifier, EventKind::ResolveFailed).with_tags(tags))?;
                return Ok(FetchOutcome::ResolveFailed {
                    identifier: identifier.to_string(),
                });
            }
        };
        self.record(
            self.event(identifier, EventKind::HostUrlFetched)
                .with_duration(hop_started.elapsed())
                .with_tags(tags),
        )?;

        let fetch_started = Instant::now();
        let document = match self.fetch(&hosting_location).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Could not fetch DT doc for {}: {}", identifier, e);
                self.record(self.event(identifier, EventKind::FetchFailed).with_tags(tags))?;
                return Ok(FetchOutcome::FetchFailed {
                    identifier: identifier.to_string(),
                });
            }
        };
        self.record(
            self.event(identifier, EventKind::DocumentFetched)
                .with_duration(fetch_started.elapsed())
                .with_tags(tags),
        )?;
        self.record(
            self.event(identifier, EventKind::DocumentReceived)
                .with_duration(hop_started.elapsed())
                .with_tags(tags),
        )?;

        Ok(FetchOutcome::Fetched(document))
    }

    async fn resolve(&self, identifier: &str) -> Result<String> {
        let timeout = self.settings.resolve_timeout;
        tokio::time::timeout(timeout, self.client.resolve(identifier, timeout))
            .await
            .map_err(|_| MeasureError::ResolveTimeout {
                dtid: identifier.to_string(),
                timeout,
            })?
    }

    async fn fetch(&self, hosting_location: &str) -> Result<Document> {
        let timeout = self.settings.fetch_timeout;
        tokio::time::timeout(timeout, self.client.fetch_document(hosting_location, timeout))
            .await
            .map_err(|_| MeasureError::FetchTimeout {
                url: hosting_location.to_string(),
                timeout,
            })?
    }

    /// Traverses the subtree rooted at `identifier`.
    pub fn traverse(
        self: Arc<Self>,
        identifier: Identifier,
        depth: u32,
        origin: Identifier,
    ) -> BoxFuture<'static, Result<TraversalNode>> {
        self.visit(identifier, depth, origin, Vec::new())
    }

    fn visit(
        self: Arc<Self>,
        identifier: Identifier,
        depth: u32,
        origin: Identifier,
        ancestors: Vec<Identifier>,
    ) -> BoxFuture<'static, Result<TraversalNode>> {
        async move {
            if ancestors.contains(&identifier) {
                tracing::warn!(
                    "Relation cycle: {} is its own ancestor (origin {}, depth {}), skipping",
                    identifier,
                    origin,
                    depth
                );
                return Ok(TraversalNode::terminal(
                    identifier,
                    depth,
                    origin,
                    NodeStatus::CycleSkipped,
                ));
            }

            let tags = EventTags::network(depth, &origin);
            let document = match self.fetch_and_record(&identifier, &tags).await? {
                FetchOutcome::Fetched(document) => document,
                FetchOutcome::ResolveFailed { .. } => {
                    return Ok(TraversalNode::terminal(
                        identifier,
                        depth,
                        origin,
                        NodeStatus::ResolveFailed,
                    ));
                }
                FetchOutcome::FetchFailed { .. } => {
                    return Ok(TraversalNode::terminal(
                        identifier,
                        depth,
                        origin,
                        NodeStatus::FetchFailed,
                    ));
                }
                FetchOutcome::Aborted { .. } => {
                    return Ok(TraversalNode::terminal(
                        identifier,
                        depth,
                        origin,
                        NodeStatus::Aborted,
                    ));
                }
            };

            let child_ids = extract_children(&document);
            tracing::debug!(
                "{} (depth {}) has {} children",
                identifier,
                depth,
                child_ids.len()
            );

            let mut lineage = ancestors;
            lineage.push(identifier.clone());

            let fan_out_started = Instant::now();
            let children = self
                .clone()
                .traverse_children(child_ids, depth + 1, &origin, lineage)
                .await?;
            self.record(
                self.event(identifier.as_str(), EventKind::ChildrenFetched)
                    .with_duration(fan_out_started.elapsed())
                    .with_tags(&tags),
            )?;

            Ok(TraversalNode {
                identifier,
                depth,
                origin,
                status: NodeStatus::Ok,
                children,
            })
        }
        .boxed()
    }

    async fn traverse_children(
        self: Arc<Self>,
        child_ids: Vec<Identifier>,
        depth: u32,
        origin: &str,
        lineage: Vec<Identifier>,
    ) -> Result<Vec<TraversalNode>> {
        let mut children = Vec::with_capacity(child_ids.len());
        match self.settings.fan_out {
            FanOut::Concurrent => {
                let tasks: Vec<_> = child_ids
                    .iter()
                    .map(|child| {
                        let visit = self.clone().visit(
                            child.clone(),
                            depth,
                            origin.to_string(),
                            lineage.clone(),
                        );
                        tokio::spawn(visit)
                    })
                    .collect();

                // join_all yields results in spawn order, i.e. extraction order
                for (child, joined) in child_ids.into_iter().zip(join_all(tasks).await) {
                    children.push(settle_branch(joined, child, depth, origin)?);
                }
            }
            FanOut::Sequential => {
                for child in child_ids {
                    let visit =
                        self.clone()
                            .visit(child.clone(), depth, origin.to_string(), lineage.clone());
                    let joined = tokio::spawn(visit).await;
                    children.push(settle_branch(joined, child, depth, origin)?);
                }
            }
        }
        Ok(children)
    }
}

/// Unwraps one spawned branch.
///
/// A branch whose task died becomes an `Aborted` node so its siblings and the
/// rest of the batch still complete; errors the branch itself returned
/// (timing log failures) are propagated.
pub(crate) fn settle_branch(
    joined: std::result::Result<Result<TraversalNode>, JoinError>,
    identifier: Identifier,
    depth: u32,
    origin: &str,
) -> Result<TraversalNode> {
    match joined {
        Ok(node) => node,
        Err(e) => {
            tracing::error!(
                "Branch task for {} (origin {}, depth {}) died: {}",
                identifier,
                origin,
                depth,
                e
            );
            Ok(TraversalNode::terminal(
                identifier,
                depth,
                origin.to_string(),
                NodeStatus::Aborted,
            ))
        }
    }
}
