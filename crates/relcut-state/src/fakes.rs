//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryRecordStore`, which satisfies the `RecordStore` contract
//! without an API server. Watches are fed either by status updates made
//! through the store or by scripts registered ahead of time.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::error::StorageError;
use crate::schema::*;
use crate::storage_traits::*;

type EventSender = mpsc::UnboundedSender<StorageResult<WatchEvent>>;

/// Step of a scripted release watch.
#[derive(Debug, Clone)]
pub enum ScriptedEvent {
    /// Deliver `MODIFIED` with the watched release carrying this status.
    Status(ReleaseStatus),
    /// Deliver `DELETED` for the watched release.
    Deleted,
    /// Deliver a raw event as-is.
    Raw(WatchEvent),
    /// Close the stream after the preceding steps.
    Close,
}

#[derive(Debug, Default)]
struct State {
    applications: Vec<Application>,
    components: Vec<Component>,
    snapshots: Vec<Snapshot>,
    releases: Vec<Release>,
    release_plans: Vec<ReleasePlan>,
    /// Keyed by release name or generateName prefix.
    scripts: Vec<(String, VecDeque<ScriptedEvent>)>,
    watchers: HashMap<String, Vec<EventSender>>,
    created: Vec<Release>,
}

fn upsert<T: Resource>(items: &mut Vec<T>, record: T) {
    let meta = record.metadata();
    match items
        .iter_mut()
        .find(|r| r.metadata().namespace == meta.namespace && r.metadata().name == meta.name)
    {
        Some(existing) => *existing = record,
        None => items.push(record),
    }
}

fn select<T: Resource>(items: &[T], namespace: &str, selector: &LabelSelector) -> Vec<T> {
    items
        .iter()
        .filter(|r| r.metadata().namespace == namespace && selector.matches(&r.metadata().labels))
        .cloned()
        .collect()
}

fn find<T: Resource>(items: &[T], namespace: &str, name: &str) -> StorageResult<T> {
    items
        .iter()
        .find(|r| r.metadata().namespace == namespace && r.metadata().name == name)
        .cloned()
        .ok_or_else(|| StorageError::NotFound {
            kind: T::KIND,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
}

fn watch_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// In-memory record store backed by vectors behind a `Mutex`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<State>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_application(&self, application: Application) {
        upsert(&mut self.state.lock().unwrap().applications, application);
    }

    pub fn insert_component(&self, component: Component) {
        upsert(&mut self.state.lock().unwrap().components, component);
    }

    pub fn insert_snapshot(&self, snapshot: Snapshot) {
        upsert(&mut self.state.lock().unwrap().snapshots, snapshot);
    }

    pub fn insert_release(&self, release: Release) {
        upsert(&mut self.state.lock().unwrap().releases, release);
    }

    pub fn insert_release_plan(&self, plan: ReleasePlan) {
        upsert(&mut self.state.lock().unwrap().release_plans, plan);
    }

    /// Releases persisted through `create_release` (dry runs excluded).
    pub fn created_releases(&self) -> Vec<Release> {
        self.state.lock().unwrap().created.clone()
    }

    /// Register the events a future watch on a matching release receives.
    ///
    /// `key` matches a release whose name equals it or starts with it, so a
    /// `generateName` prefix can script releases not created yet.
    pub fn script_watch(&self, key: impl Into<String>, events: Vec<ScriptedEvent>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .push((key.into(), events.into()));
    }

    /// Replace a release's status and notify its watchers.
    pub fn update_release_status(
        &self,
        namespace: &str,
        name: &str,
        status: ReleaseStatus,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        let release = state
            .releases
            .iter_mut()
            .find(|r| r.metadata.namespace == namespace && r.metadata.name == name)
            .ok_or_else(|| StorageError::NotFound {
                kind: Release::KIND,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        release.status = status;
        let updated = release.clone();
        if let Some(senders) = state.watchers.get_mut(&watch_key(namespace, name)) {
            senders.retain(|tx| tx.send(Ok(WatchEvent::Modified(updated.clone()))).is_ok());
        }
        Ok(())
    }

    /// Remove a release, emitting `DELETED` and closing its watches.
    pub fn delete_release(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let idx = state
            .releases
            .iter()
            .position(|r| r.metadata.namespace == namespace && r.metadata.name == name);
        let Some(idx) = idx else { return };
        let removed = state.releases.remove(idx);
        if let Some(senders) = state.watchers.remove(&watch_key(namespace, name)) {
            for tx in senders {
                let _ = tx.send(Ok(WatchEvent::Deleted(removed.clone())));
            }
        }
    }

    /// Close every open watch on a release without a terminal event.
    pub fn close_watches(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .watchers
            .remove(&watch_key(namespace, name));
    }

    fn take_script(state: &mut State, name: &str) -> Option<VecDeque<ScriptedEvent>> {
        let idx = state
            .scripts
            .iter()
            .position(|(key, _)| name == key || name.starts_with(key.as_str()))?;
        Some(state.scripts.remove(idx).1)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_applications(&self, namespace: &str) -> StorageResult<Vec<Application>> {
        let state = self.state.lock().unwrap();
        Ok(select(&state.applications, namespace, &LabelSelector::new()))
    }

    async fn get_application(&self, namespace: &str, name: &str) -> StorageResult<Application> {
        find(&self.state.lock().unwrap().applications, namespace, name)
    }

    async fn list_components(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Component>> {
        Ok(select(&self.state.lock().unwrap().components, namespace, selector))
    }

    async fn get_component(&self, namespace: &str, name: &str) -> StorageResult<Component> {
        find(&self.state.lock().unwrap().components, namespace, name)
    }

    async fn list_snapshots(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Snapshot>> {
        Ok(select(&self.state.lock().unwrap().snapshots, namespace, selector))
    }

    async fn get_snapshot(&self, namespace: &str, name: &str) -> StorageResult<Snapshot> {
        find(&self.state.lock().unwrap().snapshots, namespace, name)
    }

    async fn list_releases(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Release>> {
        Ok(select(&self.state.lock().unwrap().releases, namespace, selector))
    }

    async fn get_release(&self, namespace: &str, name: &str) -> StorageResult<Release> {
        find(&self.state.lock().unwrap().releases, namespace, name)
    }

    async fn create_release(&self, release: &Release, dry_run: bool) -> StorageResult<Release> {
        let mut created = release.clone();
        let meta = &mut created.metadata;
        if meta.name.is_empty() {
            let prefix = meta.generate_name.clone().ok_or_else(|| StorageError::Api {
                status: 422,
                message: "name or generateName is required".to_string(),
            })?;
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            meta.name = format!("{prefix}{}", &suffix[..5]);
        }
        meta.creation_timestamp = Some(Utc::now());

        let mut state = self.state.lock().unwrap();
        if find(&state.releases, &meta.namespace, &meta.name).is_ok() {
            return Err(StorageError::AlreadyExists {
                kind: Release::KIND,
                namespace: meta.namespace.clone(),
                name: meta.name.clone(),
            });
        }
        if !dry_run {
            state.releases.push(created.clone());
            state.created.push(created.clone());
        }
        Ok(created)
    }

    async fn list_release_plans(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<ReleasePlan>> {
        Ok(select(&self.state.lock().unwrap().release_plans, namespace, selector))
    }

    async fn watch_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> StorageResult<WatchSubscription<Release>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        let current = find(&state.releases, namespace, name).ok();

        let mut keep_open = true;
        if let Some(script) = Self::take_script(&mut state, name) {
            let base = current.clone().unwrap_or_else(|| Release {
                metadata: ObjectMeta::new(namespace, name),
                ..Default::default()
            });
            for step in script {
                let event = match step {
                    ScriptedEvent::Status(status) => {
                        let mut release = base.clone();
                        release.status = status;
                        WatchEvent::Modified(release)
                    }
                    ScriptedEvent::Deleted => WatchEvent::Deleted(base.clone()),
                    ScriptedEvent::Raw(event) => event,
                    ScriptedEvent::Close => {
                        keep_open = false;
                        break;
                    }
                };
                let _ = tx.send(Ok(event));
            }
        }

        if keep_open {
            state
                .watchers
                .entry(watch_key(namespace, name))
                .or_default()
                .push(tx);
        }
        Ok(WatchSubscription::new(rx, None))
    }
}
