//! Per-invocation release configuration.

use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::manifest::{Environment, ReleaseNote};

/// How long to wait for a release pipeline by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Everything one release run needs, passed explicitly to each operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseConfig {
    pub namespace: String,
    pub application: String,
    pub environment: Environment,
    /// Release this snapshot instead of selecting a candidate.
    pub snapshot: Option<String>,
    /// Release the snapshot built from this commit.
    pub sha: Option<String>,
    /// Only consider snapshots whose sources declare this version.
    pub version: Option<String>,
    pub force_release: bool,
    pub timeout: Duration,
    pub dry_run: bool,
    pub release_notes: Option<ReleaseNote>,
}

impl ReleaseConfig {
    pub fn new(namespace: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            application: application.into(),
            environment: Environment::default(),
            snapshot: None,
            sha: None,
            version: None,
            force_release: false,
            timeout: DEFAULT_TIMEOUT,
            dry_run: false,
            release_notes: None,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_force_release(mut self, force: bool) -> Self {
        self.force_release = force;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_release_notes(mut self, notes: ReleaseNote) -> Self {
        self.release_notes = Some(notes);
        self
    }

    /// Whether a specific snapshot is pinned by name or commit.
    pub fn is_pinned(&self) -> bool {
        self.snapshot.is_some() || self.sha.is_some()
    }
}

/// Load release notes from a YAML document.
pub fn load_release_notes(path: &Path) -> Result<ReleaseNote> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}
