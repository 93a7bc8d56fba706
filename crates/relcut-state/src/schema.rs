//! Record definitions for the delivery platform's resource kinds
//!
//! Kinds:
//! - applications: Release-able units, typed by a label (`operator` | `fbc`)
//! - components: Buildable units owned by one application
//! - snapshots: Immutable build records (component name -> image pullspec)
//! - releases: Release requests and their pipeline status
//! - releaseplans: Application + environment -> release target
//!
//! Field names follow the API server's camelCase JSON so records decode
//! directly from list, get and watch payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// API group/version shared by every kind this crate handles.
pub const API_VERSION: &str = "appstudio.redhat.com/v1alpha1";

/// Condition type carried by a snapshot once integration tests ran.
pub const TEST_SUCCEEDED_CONDITION: &str = "AppStudioTestSucceeded";
/// Older name of the snapshot test condition.
pub const INTEGRATION_STATUS_CONDITION: &str = "AppStudioIntegrationStatus";
/// Reason set on the snapshot test condition when tests finished successfully.
pub const FINISHED_REASON: &str = "Finished";

/// Condition type tracking the overall outcome of a release.
pub const RELEASED_CONDITION: &str = "Released";
/// Condition type tracking the managed pipeline of a release.
pub const MANAGED_PIPELINE_CONDITION: &str = "ManagedPipelineProcessed";
/// Suffix shared by every pipeline-processing condition type.
pub const PIPELINE_PROCESSED_SUFFIX: &str = "PipelineProcessed";

/// A kind served by the record store.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind name as the API server spells it.
    const KIND: &'static str;
    /// Lower-case plural used in collection URLs.
    const PLURAL: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    /// Record name (empty until the server assigns a generated one).
    fn name(&self) -> &str {
        &self.metadata().name
    }
}

/// Common record metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_creation_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.creation_timestamp = Some(ts);
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Status condition as reported by platform controllers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(type_: &str, status: &str, reason: &str, message: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: None,
        }
    }
}

fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A release-able unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ApplicationSpec,
}

impl Resource for Application {
    const KIND: &'static str = "Application";
    const PLURAL: &'static str = "applications";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default)]
    pub application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
}

/// A buildable unit belonging to exactly one application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ComponentSpec,
}

impl Component {
    pub fn new(metadata: ObjectMeta, application: impl Into<String>) -> Self {
        Self {
            metadata,
            spec: ComponentSpec {
                application: application.into(),
                ..Default::default()
            },
        }
    }
}

impl Resource for Component {
    const KIND: &'static str = "Component";
    const PLURAL: &'static str = "components";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Source-control provenance of a snapshot component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub url: String,
    #[serde(default)]
    pub revision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,
}

/// One (component name -> image) entry of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotComponent {
    pub name: String,
    #[serde(default)]
    pub container_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ComponentSource>,
}

impl SnapshotComponent {
    pub fn new(name: impl Into<String>, container_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container_image: container_image.into(),
            source: None,
        }
    }

    pub fn with_git_source(mut self, url: impl Into<String>, revision: impl Into<String>) -> Self {
        self.source = Some(ComponentSource {
            git: Some(GitSource {
                url: url.into(),
                revision: revision.into(),
            }),
        });
        self
    }

    pub fn git_source(&self) -> Option<&GitSource> {
        self.source.as_ref().and_then(|s| s.git.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSpec {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub components: Vec<SnapshotComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// An immutable record of a build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SnapshotSpec,
    #[serde(default)]
    pub status: SnapshotStatus,
}

impl Snapshot {
    /// Pullspec recorded for `component`, if the snapshot contains it.
    pub fn component_image(&self, component: &str) -> Option<&str> {
        self.spec
            .components
            .iter()
            .find(|c| c.name == component)
            .map(|c| c.container_image.as_str())
    }

    /// Whether integration tests for this snapshot finished successfully.
    pub fn has_finished_successfully(&self) -> bool {
        self.status.conditions.iter().any(|c| {
            (c.type_ == TEST_SUCCEEDED_CONDITION || c.type_ == INTEGRATION_STATUS_CONDITION)
                && c.reason == FINISHED_REASON
        })
    }

    /// Reason of the test condition, used for listings.
    pub fn test_status(&self) -> Option<&str> {
        find_condition(&self.status.conditions, TEST_SUCCEEDED_CONDITION)
            .or_else(|| find_condition(&self.status.conditions, INTEGRATION_STATUS_CONDITION))
            .map(|c| c.reason.as_str())
    }
}

impl Resource for Snapshot {
    const KIND: &'static str = "Snapshot";
    const PLURAL: &'static str = "snapshots";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    pub snapshot: String,
    pub release_plan: String,
    /// Opaque payload handed to the release pipeline (release notes live here)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Opaque artifact payload published by a successful pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl ReleaseStatus {
    /// Status carrying a single `Released` condition with the given reason.
    pub fn with_released(reason: &str, message: &str) -> Self {
        let status = match reason {
            "Succeeded" => "True",
            "Failed" => "False",
            _ => "Unknown",
        };
        Self {
            conditions: vec![Condition::new(RELEASED_CONDITION, status, reason, message)],
            ..Default::default()
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_artifacts(mut self, artifacts: serde_json::Value) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn released_condition(&self) -> Option<&Condition> {
        find_condition(&self.conditions, RELEASED_CONDITION)
    }
}

/// A release request and its pipeline status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub metadata: ObjectMeta,
    pub spec: ReleaseSpec,
    #[serde(default)]
    pub status: ReleaseStatus,
}

impl Release {
    /// Reason of the `Released` condition, if the pipeline reported one.
    pub fn released_reason(&self) -> Option<&str> {
        self.status.released_condition().map(|c| c.reason.as_str())
    }

    pub fn is_succeeded(&self) -> bool {
        self.released_reason() == Some("Succeeded")
    }
}

impl Resource for Release {
    const KIND: &'static str = "Release";
    const PLURAL: &'static str = "releases";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

// ---------------------------------------------------------------------------
// ReleasePlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePlanSpec {
    #[serde(default)]
    pub application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Maps an application + environment label to a release target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReleasePlanSpec,
}

impl Resource for ReleasePlan {
    const KIND: &'static str = "ReleasePlan";
    const PLURAL: &'static str = "releaseplans";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
