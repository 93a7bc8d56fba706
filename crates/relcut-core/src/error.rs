//! Error taxonomy for release cutting.

use relcut_state::StorageError;

use crate::image::ImageError;
use crate::version::VersionError;

/// Errors produced while selecting, generating or tracking a release.
///
/// A snapshot that merely fails a cross-check is never an error; see
/// [`crate::CandidateSelector::validate_candidacy`].
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("label {label} not found in {kind} {namespace}/{name}")]
    MissingLabel {
        label: &'static str,
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("unsupported type '{app_type}' for application {namespace}/{application}")]
    UnsupportedApplicationType {
        namespace: String,
        application: String,
        app_type: String,
    },

    #[error(
        "application {namespace}/{application} has more than one bundle component: {}",
        .components.join(", ")
    )]
    MultipleBundleComponents {
        namespace: String,
        application: String,
        components: Vec<String>,
    },

    #[error("application {namespace}/{application} does not have a bundle component")]
    NoBundleComponent {
        namespace: String,
        application: String,
    },

    #[error("application {namespace}/{application} of type fbc must have exactly 1 component, found {count}")]
    ComponentCount {
        namespace: String,
        application: String,
        count: usize,
    },

    #[error("no release plan found for application {namespace}/{application} in environment {environment}")]
    ReleasePlanNotFound {
        namespace: String,
        application: String,
        environment: String,
    },

    #[error("component reference {component} in snapshot {snapshot} not found")]
    MissingSnapshotComponent { snapshot: String, component: String },

    #[error("label 'version' not found in bundle image {image}")]
    MissingVersionLabel { image: String },

    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error(
        "no new valid snapshot candidates found for bundle {namespace}/{component}{}",
        cutoff_suffix(.cutoff)
    )]
    NoCandidate {
        namespace: String,
        component: String,
        cutoff: Option<String>,
    },

    #[error("no snapshot matching {selector} found in namespace {namespace}")]
    SnapshotNotFound { namespace: String, selector: String },

    #[error("no snapshot found for application {namespace}/{application} with version {version}")]
    NoSnapshotForVersion {
        namespace: String,
        application: String,
        version: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("image inspection failed: {0}")]
    Image(#[from] ImageError),

    #[error("version resolution failed: {0}")]
    Version(#[from] VersionError),

    #[error("release {release} failed: {message}")]
    ReleaseFailed { release: String, message: String },

    #[error("release {release} was deleted before reaching a terminal state")]
    ReleaseDeleted { release: String },

    #[error("watch on release {release} closed before reaching a terminal state")]
    WatchClosed { release: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid release notes: {0}")]
    ReleaseNotes(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn cutoff_suffix(cutoff: &Option<String>) -> String {
    match cutoff {
        Some(name) => format!(" after the one used for the last release {name}"),
        None => String::new(),
    }
}

impl ReleaseError {
    /// Whether this is a hard configuration error that retrying cannot fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReleaseError::MissingLabel { .. }
                | ReleaseError::UnsupportedApplicationType { .. }
                | ReleaseError::MultipleBundleComponents { .. }
                | ReleaseError::NoBundleComponent { .. }
                | ReleaseError::ComponentCount { .. }
                | ReleaseError::ReleasePlanNotFound { .. }
                | ReleaseError::MissingSnapshotComponent { .. }
                | ReleaseError::MissingVersionLabel { .. }
                | ReleaseError::InvalidVersion { .. }
        )
    }
}

/// Result type for release operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;
