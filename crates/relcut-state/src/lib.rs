//! Relcut-State: Typed record store access for relcut
//!
//! This crate provides the persistence layer for release cutting. It handles
//! all I/O with the delivery platform's API server, exposing applications,
//! components, snapshots, releases and release plans as typed records.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: Record decoding, label-filtered listing, and release watches.
//!
//! ## Key Components
//!
//! - `RecordStore`: Backend-agnostic list/get/create/watch trait
//! - `KubeRestStore`: `RecordStore` over the API server's REST protocol
//! - `WatchSubscription`: Stoppable event stream for a single release
//! - `fakes::MemoryRecordStore`: In-memory store with scripted watches

mod error;
pub mod fakes;
pub mod kube_rest;
pub mod labels;
mod schema;
pub mod storage_traits;

pub use error::StorageError;
pub use kube_rest::{KubeRestConfig, KubeRestStore};
pub use schema::{
    Application, ApplicationSpec, Component, ComponentSource, ComponentSpec, Condition, GitSource,
    ObjectMeta, Release, ReleasePlan, ReleasePlanSpec, ReleaseSpec, ReleaseStatus, Resource,
    Snapshot, SnapshotComponent, SnapshotSpec, SnapshotStatus, API_VERSION, FINISHED_REASON,
    INTEGRATION_STATUS_CONDITION, MANAGED_PIPELINE_CONDITION, PIPELINE_PROCESSED_SUFFIX,
    RELEASED_CONDITION, TEST_SUCCEEDED_CONDITION,
};
pub use storage_traits::{
    ApiStatus, LabelSelector, RecordStore, StopHandle, StorageResult, WatchEvent,
    WatchSubscription,
};
