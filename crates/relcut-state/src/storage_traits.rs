//! Storage trait definitions for relcut
//!
//! These traits define the record store abstraction the release workflow
//! consumes:
//! - `RecordStore`: typed list/get/create/watch over applications,
//!   components, snapshots, releases and release plans
//! - `LabelSelector`: equality-based label filtering for list calls
//! - `WatchSubscription`: an event stream scoped to one record, stoppable
//!   from any task through a `StopHandle`
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module; `kube_rest` talks to an API server.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::StorageError;
use crate::schema::{Application, Component, Release, ReleasePlan, Snapshot};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// LabelSelector
// ---------------------------------------------------------------------------

/// Equality-based label selector (`k1=v1,k2=v2`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every selector term is present in `labels`.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }

    /// Render in the API server's query syntax.
    pub fn to_query(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_query())
    }
}

// ---------------------------------------------------------------------------
// Watch events and subscriptions
// ---------------------------------------------------------------------------

/// Error payload the API server sends in `ERROR` watch events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub code: u16,
}

/// One event of a watch stream, decoded straight from `{"type", "object"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum WatchEvent<T = Release> {
    Added(T),
    Modified(T),
    Deleted(T),
    Bookmark(serde_json::Value),
    Error(ApiStatus),
}

/// Stops a watch subscription from outside the consuming task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the subscription. The consumer sees end-of-stream on its next read.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Event stream scoped to a single record.
///
/// Guarantees:
/// - Events are yielded in the order the producer emitted them.
/// - After `StopHandle::stop`, `next` returns `None` without draining
///   buffered events.
/// - Dropping the subscription aborts its producer task, if any.
pub struct WatchSubscription<T = Release> {
    events: mpsc::UnboundedReceiver<StorageResult<WatchEvent<T>>>,
    stop: StopHandle,
    producer: Option<JoinHandle<()>>,
}

impl<T> WatchSubscription<T> {
    /// Wrap a channel fed by `producer` (or by a store holding the sender).
    pub fn new(
        events: mpsc::UnboundedReceiver<StorageResult<WatchEvent<T>>>,
        producer: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            events,
            stop: StopHandle::new(),
            producer,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Next event, or `None` once the stream closed or was stopped.
    pub async fn next(&mut self) -> Option<StorageResult<WatchEvent<T>>> {
        let mut stopped = self.stop.tx.subscribe();
        if *stopped.borrow_and_update() {
            return None;
        }
        tokio::select! {
            biased;
            _ = wait_stopped(&mut stopped) => None,
            event = self.events.recv() => event,
        }
    }
}

async fn wait_stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // sender gone: nobody can stop us anymore
            std::future::pending::<()>().await;
        }
    }
}

impl<T> Drop for WatchSubscription<T> {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Typed access to the platform's records.
///
/// Guarantees:
/// - `list_*` return records in the store's native order; callers sort.
/// - `get_*` return `StorageError::NotFound` for absent records.
/// - `create_release` with `dry_run = true` validates and returns the record
///   as it would be stored, without persisting it.
/// - `watch_release` yields events for exactly one release, by name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_applications(&self, namespace: &str) -> StorageResult<Vec<Application>>;

    async fn get_application(&self, namespace: &str, name: &str) -> StorageResult<Application>;

    async fn list_components(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Component>>;

    async fn get_component(&self, namespace: &str, name: &str) -> StorageResult<Component>;

    async fn list_snapshots(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Snapshot>>;

    async fn get_snapshot(&self, namespace: &str, name: &str) -> StorageResult<Snapshot>;

    async fn list_releases(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Release>>;

    async fn get_release(&self, namespace: &str, name: &str) -> StorageResult<Release>;

    /// Create a release, resolving `generateName` into a concrete name.
    async fn create_release(&self, release: &Release, dry_run: bool) -> StorageResult<Release>;

    async fn list_release_plans(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<ReleasePlan>>;

    /// Subscribe to changes of a single release.
    async fn watch_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> StorageResult<WatchSubscription<Release>>;
}
