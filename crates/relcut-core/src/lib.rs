//! Relcut Core Library
//!
//! Selects the next releasable snapshot of an application, generates the
//! release record for it, and tracks the release pipeline to completion.
//!
//! Control flow: classifier -> selector -> manifest -> create -> tracker.

pub mod classifier;
pub mod config;
pub mod error;
pub mod fakes;
pub mod image;
pub mod manifest;
pub mod obs;
pub mod release;
pub mod selector;
pub mod snapshots;
pub mod telemetry;
pub mod tracker;
pub mod version;

pub use classifier::{classify, ApplicationContext, ApplicationShape};
pub use config::{load_release_notes, ReleaseConfig, DEFAULT_TIMEOUT};
pub use error::{ReleaseError, Result};
pub use image::{
    digest_suffix, same_digest, ImageError, ImageInspector, ImageLabels, RegistryAuth,
    RegistryInspector,
};
pub use manifest::{list_release_plans, Environment, ManifestGenerator, ReleaseNote, ReleaseType};
pub use obs::{
    emit_candidate_rejected, emit_candidate_selected, emit_release_created,
    emit_release_finished, emit_release_progressing, emit_release_timed_out, ReleaseSpan,
};
pub use release::{
    create_release, generate_release_manifest, list_snapshots, release_and_wait,
    release_status, resolve_candidate, Collaborators,
};
pub use selector::{list_releases, list_successful_releases, CandidateSelector};
pub use snapshots::{find_snapshot, snapshots_for_version};
pub use telemetry::init_tracing;
pub use tracker::{await_completion, failure_message, Completion, CompletionState};
pub use version::{parse_tolerant, GitVersionResolver, ResolverScope, VersionError, VersionResolver};

pub use relcut_state::{
    Application, Component, RecordStore, Release, ReleasePlan, Snapshot, StorageError,
};
