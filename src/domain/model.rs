use crate::domain::ports::ConfigProvider;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// DTID：可解析的 URI，同時也是所有時間記錄的關聯鍵
pub type Identifier = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Parent,
    Child,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "dt-id")]
    pub target: Identifier,
    #[serde(rename = "relationType")]
    pub relation_type: RelationType,
}

/// DT doc as served from `<hosting location>/index.json`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "dt-id")]
    pub identifier: Identifier,
    #[serde(rename = "hosting-iri", default)]
    pub hosting_location: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_relations")]
    pub relations: Option<Vec<Relation>>,
}

// 關係列表格式錯誤時視為沒有關係，而不是整份文件解析失敗
fn lenient_relations<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<Relation>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value::<Vec<Relation>>(value) {
        Ok(relations) => Some(relations),
        Err(e) => {
            tracing::debug!("Ignoring malformed relations: {}", e);
            None
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Ok,
    ResolveFailed,
    FetchFailed,
    /// Identifier already on its own ancestor path; not traversed again.
    CycleSkipped,
    /// The branch task died (panicked or was cancelled) before producing a node.
    Aborted,
}

impl NodeStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            NodeStatus::ResolveFailed | NodeStatus::FetchFailed | NodeStatus::Aborted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalNode {
    pub identifier: Identifier,
    pub depth: u32,
    pub origin: Identifier,
    pub status: NodeStatus,
    pub children: Vec<TraversalNode>,
}

impl TraversalNode {
    pub fn terminal(identifier: Identifier, depth: u32, origin: Identifier, status: NodeStatus) -> Self {
        Self {
            identifier,
            depth,
            origin,
            status,
            children: Vec::new(),
        }
    }

    /// Pre-order walk over this node and all of its descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    pub fn failure_count(&self) -> usize {
        self.walk().filter(|node| node.status.is_failure()).count()
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a TraversalNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a TraversalNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Registry mode result for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(Document),
    ResolveFailed { identifier: Identifier },
    FetchFailed { identifier: Identifier },
    Aborted { identifier: Identifier },
}

impl FetchOutcome {
    pub fn document(&self) -> Option<&Document> {
        match self {
            FetchOutcome::Fetched(document) => Some(document),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    HostUrlFetched,
    DocumentFetched,
    DocumentReceived,
    ResolveFailed,
    FetchFailed,
    ChildrenFetched,
    LoopStarted,
    LoopEnded,
    /// `metadata` row carrying the wall-clock start of the batch (RFC 3339).
    StartedAt(String),
    NetworkLoopTotal { origins: usize },
    RegistryLoopTotal { documents: usize },
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::HostUrlFetched => f.write_str("DTID > hosturl fetch time"),
            EventKind::DocumentFetched => f.write_str("Hosturl > DT doc fetch time"),
            EventKind::DocumentReceived => f.write_str("DT doc received"),
            EventKind::ResolveFailed => f.write_str("Could not resolve DTID"),
            EventKind::FetchFailed => f.write_str("Could not fetch DT doc"),
            EventKind::ChildrenFetched => f.write_str("Duration to fetch all children"),
            EventKind::LoopStarted => f.write_str("Start measurement loop for a list of twins"),
            EventKind::LoopEnded => f.write_str("Ended measurement loop"),
            EventKind::StartedAt(timestamp) => write!(f, "Start at {}", timestamp),
            EventKind::NetworkLoopTotal { origins } => {
                write!(f, "Whole loop to fetch children of {} DTs", origins)
            }
            EventKind::RegistryLoopTotal { documents } => {
                write!(f, "Whole loop to fetch {} DT docs", documents)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingEvent {
    pub elapsed_seconds: f64,
    pub identifier: String,
    pub kind: EventKind,
    pub duration: Option<f64>,
    pub depth: Option<u32>,
    pub origin: Option<Identifier>,
    pub base: Option<Identifier>,
    pub sample_number: u32,
}

pub const LOG_PLACEHOLDER: &str = "-";

pub const LOG_HEADER: [&str; 8] = [
    "Time", "DTID", "Event", "Duration", "Depth", "Origin", "Base", "Number",
];

impl TimingEvent {
    pub fn new(elapsed: Duration, identifier: impl Into<String>, kind: EventKind, sample_number: u32) -> Self {
        Self {
            elapsed_seconds: elapsed.as_secs_f64(),
            identifier: identifier.into(),
            kind,
            duration: None,
            depth: None,
            origin: None,
            base: None,
            sample_number,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration.as_secs_f64());
        self
    }

    pub fn with_tags(mut self, tags: &EventTags) -> Self {
        self.depth = tags.depth;
        self.origin = tags.origin.clone();
        self.base = tags.base.clone();
        self
    }

    /// One log row in `LOG_HEADER` column order; absent fields become `-`.
    pub fn to_row(&self) -> [String; 8] {
        fn or_placeholder<T: ToString>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| LOG_PLACEHOLDER.to_string())
        }

        [
            format!("{:.6}", self.elapsed_seconds),
            self.identifier.clone(),
            self.kind.to_string(),
            self.duration
                .map(|d| format!("{:.6}", d))
                .unwrap_or_else(|| LOG_PLACEHOLDER.to_string()),
            or_placeholder(&self.depth),
            or_placeholder(&self.origin),
            or_placeholder(&self.base),
            self.sample_number.to_string(),
        ]
    }
}

/// Correlation columns shared by every row of one hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTags {
    pub depth: Option<u32>,
    pub origin: Option<Identifier>,
    pub base: Option<Identifier>,
}

impl EventTags {
    pub fn network(depth: u32, origin: &str) -> Self {
        Self {
            depth: Some(depth),
            origin: Some(origin.to_string()),
            base: None,
        }
    }

    pub fn registry(base: &str) -> Self {
        Self {
            depth: None,
            origin: None,
            base: Some(base.to_string()),
        }
    }
}

/// Per-batch input of the measurement core.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementConfig {
    pub identifiers: Vec<Identifier>,
    pub resolve_timeout: Duration,
    pub fetch_timeout: Duration,
    pub sample_number: u32,
}

impl MeasurementConfig {
    pub fn for_sample<C: ConfigProvider + ?Sized>(provider: &C, sample_number: u32) -> Self {
        Self {
            identifiers: provider.identifiers().to_vec(),
            resolve_timeout: provider.resolve_timeout(),
            fetch_timeout: provider.fetch_timeout(),
            sample_number,
        }
    }

    /// Bracket rows name the whole batch, e.g. `[https://a, https://b]`.
    pub fn batch_label(&self) -> String {
        format!("[{}]", self.identifiers.join(", "))
    }
}
