#![allow(dead_code)]

use async_trait::async_trait;
use dtweb_measure::domain::model::{Document, Relation, RelationType};
use dtweb_measure::domain::ports::{DocumentFetcher, Resolver};
use dtweb_measure::utils::error::{MeasureError, Result};
use dtweb_measure::TimingRecorder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const HOST_PREFIX: &str = "https://hosts.test/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    Fail,
    /// Never answers; the engine deadline has to cut it off.
    Hang,
    /// Brings down the task serving the request.
    Panic,
}

#[derive(Debug, Clone)]
pub struct FakeTwin {
    pub children: Vec<String>,
    pub resolve: Behaviour,
    pub fetch: Behaviour,
    pub resolve_delay: Duration,
    pub fetch_delay: Duration,
    pub without_relations: bool,
}

impl FakeTwin {
    fn new(children: &[&str]) -> Self {
        Self {
            children: children.iter().map(|c| c.to_string()).collect(),
            resolve: Behaviour::Succeed,
            fetch: Behaviour::Succeed,
            resolve_delay: Duration::ZERO,
            fetch_delay: Duration::ZERO,
            without_relations: false,
        }
    }
}

/// In-memory twin web: DTID `x` resolves to `https://hosts.test/x` which
/// serves a document whose child relations are the configured children.
#[derive(Default)]
pub struct FakeTwinWeb {
    twins: HashMap<String, FakeTwin>,
    resolve_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<String>>,
}

impl FakeTwinWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn twin(mut self, dtid: &str, children: &[&str]) -> Self {
        self.twins.insert(dtid.to_string(), FakeTwin::new(children));
        self
    }

    pub fn configure(mut self, dtid: &str, f: impl FnOnce(&mut FakeTwin)) -> Self {
        let twin = self
            .twins
            .entry(dtid.to_string())
            .or_insert_with(|| FakeTwin::new(&[]));
        f(twin);
        self
    }

    /// Complete tree of `height` levels below the root, `width` children each.
    /// Returns the web and the root DTID.
    pub fn tree(height: u32, width: usize) -> (Self, String) {
        fn build(web: &mut FakeTwinWeb, dtid: String, height: u32, width: usize) {
            let children: Vec<String> = if height == 0 {
                Vec::new()
            } else {
                (0..width).map(|i| format!("{}.{}", dtid, i)).collect()
            };
            let refs: Vec<&str> = children.iter().map(String::as_str).collect();
            web.twins.insert(dtid.clone(), FakeTwin::new(&refs));
            for child in children {
                build(web, child, height - 1, width);
            }
        }

        let mut web = FakeTwinWeb::new();
        let root = "https://dtid.test/root".to_string();
        build(&mut web, root.clone(), height, width);
        (web, root)
    }

    pub fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().unwrap().clone()
    }

    fn lookup(&self, dtid: &str) -> Option<&FakeTwin> {
        self.twins.get(dtid)
    }
}

async fn act(behaviour: Behaviour, delay: Duration) -> bool {
    match behaviour {
        Behaviour::Succeed => {
            tokio::time::sleep(delay).await;
            true
        }
        Behaviour::Fail => {
            tokio::time::sleep(delay).await;
            false
        }
        Behaviour::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            false
        }
        Behaviour::Panic => {
            tokio::time::sleep(delay).await;
            panic!("twin server crashed")
        }
    }
}

#[async_trait]
impl Resolver for FakeTwinWeb {
    async fn resolve(&self, identifier: &str, _timeout: Duration) -> Result<String> {
        self.resolve_calls.lock().unwrap().push(identifier.to_string());
        let twin = self.lookup(identifier).ok_or_else(|| MeasureError::ResolveError {
            dtid: identifier.to_string(),
            message: "404 Not Found".to_string(),
        })?;

        if act(twin.resolve, twin.resolve_delay).await {
            Ok(format!("{}{}", HOST_PREFIX, identifier))
        } else {
            Err(MeasureError::ResolveError {
                dtid: identifier.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }
}

#[async_trait]
impl DocumentFetcher for FakeTwinWeb {
    async fn fetch_document(&self, hosting_location: &str, _timeout: Duration) -> Result<Document> {
        let dtid = hosting_location.trim_start_matches(HOST_PREFIX);
        self.fetch_calls.lock().unwrap().push(dtid.to_string());
        let twin = self.lookup(dtid).ok_or_else(|| MeasureError::FetchError {
            url: hosting_location.to_string(),
            message: "404 Not Found".to_string(),
        })?;

        if !act(twin.fetch, twin.fetch_delay).await {
            return Err(MeasureError::FetchError {
                url: hosting_location.to_string(),
                message: "500 Internal Server Error".to_string(),
            });
        }

        let mut relations = vec![Relation {
            target: "http://d-t.fi/juuso".to_string(),
            relation_type: RelationType::Parent,
        }];
        relations.extend(twin.children.iter().map(|child| Relation {
            target: child.clone(),
            relation_type: RelationType::Child,
        }));

        Ok(Document {
            identifier: dtid.to_string(),
            hosting_location: Some(hosting_location.to_string()),
            name: format!("Twin {}", dtid),
            description: "Lorem ipsum dolor sit amet.".to_string(),
            relations: if twin.without_relations {
                None
            } else {
                Some(relations)
            },
        })
    }
}

pub struct LogFile {
    _dir: TempDir,
    pub path: PathBuf,
}

impl LogFile {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main_log.csv");
        Self { _dir: dir, path }
    }

    pub fn recorder(&self) -> Arc<TimingRecorder> {
        Arc::new(TimingRecorder::open(&self.path).unwrap())
    }

    pub fn rows(&self) -> Vec<LogRow> {
        read_rows(&self.path)
    }
}

#[derive(Debug, Clone)]
pub struct LogRow {
    pub time: String,
    pub dtid: String,
    pub event: String,
    pub duration: String,
    pub depth: String,
    pub origin: String,
    pub base: String,
    pub number: String,
}

pub fn read_rows(path: &Path) -> Vec<LogRow> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["Time", "DTID", "Event", "Duration", "Depth", "Origin", "Base", "Number"]
    );
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            LogRow {
                time: record[0].to_string(),
                dtid: record[1].to_string(),
                event: record[2].to_string(),
                duration: record[3].to_string(),
                depth: record[4].to_string(),
                origin: record[5].to_string(),
                base: record[6].to_string(),
                number: record[7].to_string(),
            }
        })
        .collect()
}

pub fn rows_for<'a>(rows: &'a [LogRow], dtid: &str, event: &str) -> Vec<&'a LogRow> {
    rows.iter()
        .filter(|row| row.dtid == dtid && row.event == event)
        .collect()
}
