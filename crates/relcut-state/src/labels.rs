//! Label keys and values used on platform records.

/// Application shape: `operator` or `fbc`.
pub const APPLICATION_TYPE_LABEL: &str = "korn.redhat.io/application";
/// Marks the bundle component of an operator application.
pub const COMPONENT_TYPE_LABEL: &str = "korn.redhat.io/component";
/// Alias under which a satellite's digest is recorded in the bundle image labels.
pub const BUNDLE_REFERENCE_LABEL: &str = "korn.redhat.io/bundle-label";
/// Environment a release plan targets.
pub const ENVIRONMENT_LABEL: &str = "korn.redhat.io/environment";

pub const COMPONENT_BUNDLE_TYPE: &str = "bundle";
pub const OPERATOR_APPLICATION_TYPE: &str = "operator";
pub const FBC_APPLICATION_TYPE: &str = "fbc";

/// Application a snapshot or release belongs to.
pub const APPLICATION_LABEL: &str = "appstudio.openshift.io/application";
/// Component whose build produced a snapshot.
pub const COMPONENT_LABEL: &str = "appstudio.openshift.io/component";
/// Pipelines-as-code event that triggered a build.
pub const EVENT_TYPE_LABEL: &str = "pac.test.appstudio.openshift.io/event-type";
/// Commit SHA a snapshot was built from.
pub const SHA_LABEL: &str = "pac.test.appstudio.openshift.io/sha";
/// Commit title annotation a snapshot was built from.
pub const SHA_TITLE_ANNOTATION: &str = "pac.test.appstudio.openshift.io/sha-title";

pub const PUSH_EVENT_TYPE: &str = "push";
