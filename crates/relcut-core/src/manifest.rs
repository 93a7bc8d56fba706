//! Release manifest generation.
//!
//! Turns a selected snapshot into a `Release` record: generated name
//! `{application}-{environment}-`, the snapshot, the release plan matching
//! the environment, and release notes classifying the release.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use relcut_state::labels::{APPLICATION_LABEL, COMPONENT_LABEL, ENVIRONMENT_LABEL};
use relcut_state::{
    LabelSelector, ObjectMeta, RecordStore, Release, ReleasePlan, ReleaseSpec, ReleaseStatus,
    Snapshot,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::classifier::{ApplicationContext, ApplicationShape};
use crate::error::{ReleaseError, Result};
use crate::image::{ImageInspector, VERSION_LABEL};
use crate::version::parse_tolerant;

/// Key under which release notes are stored in the release data payload.
pub const RELEASE_NOTES_KEY: &str = "releaseNotes";

/// Target environment of a release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "invalid value {other}: only 'staging' or 'production' supported"
            )),
        }
    }
}

/// Advisory classification of a release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseType {
    /// Enhancement advisory
    #[default]
    #[serde(rename = "RHEA")]
    Feature,
    /// Bug fix advisory
    #[serde(rename = "RHBA")]
    Bugfix,
    /// Security advisory
    #[serde(rename = "RHSA")]
    Security,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Feature => "RHEA",
            ReleaseType::Bugfix => "RHBA",
            ReleaseType::Security => "RHSA",
        }
    }

    /// Feature for `X.Y.0` (pre-release and build suffixes included),
    /// bugfix otherwise.
    pub fn from_version(version: &semver::Version) -> Self {
        if version.patch == 0 {
            ReleaseType::Feature
        } else {
            ReleaseType::Bugfix
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "RHEA" => Ok(ReleaseType::Feature),
            "RHBA" => Ok(ReleaseType::Bugfix),
            "RHSA" => Ok(ReleaseType::Security),
            other => Err(format!(
                "invalid release type {other}: only 'RHEA', 'RHBA' or 'RHSA' are supported"
            )),
        }
    }
}

/// Release notes handed to the release pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseNote {
    #[serde(rename = "type", default)]
    pub release_type: ReleaseType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub issues: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cves: Vec<BTreeMap<String, String>>,
    #[serde(rename = "reference", default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl ReleaseNote {
    pub fn new(release_type: ReleaseType) -> Self {
        Self {
            release_type,
            ..Default::default()
        }
    }

    /// Merge caller-supplied notes into a computed classification.
    ///
    /// Issues, CVEs and references come from `supplied`; the computed type
    /// wins unless the caller declared a security advisory.
    pub fn merged(computed: ReleaseType, supplied: Option<&ReleaseNote>) -> Self {
        match supplied {
            None => Self::new(computed),
            Some(notes) => Self {
                release_type: if notes.release_type == ReleaseType::Security {
                    ReleaseType::Security
                } else {
                    computed
                },
                ..notes.clone()
            },
        }
    }

    /// `{"releaseNotes": {...}}` payload for `spec.data`.
    pub fn to_release_data(&self) -> Result<serde_json::Value> {
        let mut data = serde_json::Map::new();
        data.insert(RELEASE_NOTES_KEY.to_string(), serde_json::to_value(self)?);
        Ok(serde_json::Value::Object(data))
    }

    /// Release notes recorded on an existing release, if any.
    pub fn from_release(release: &Release) -> Option<Self> {
        let notes = release.spec.data.as_ref()?.get(RELEASE_NOTES_KEY)?;
        serde_json::from_value(notes.clone()).ok()
    }
}

/// Release plans in `namespace` for `environment`, optionally restricted to
/// one application.
pub async fn list_release_plans(
    store: &dyn RecordStore,
    namespace: &str,
    application: Option<&str>,
    environment: Option<Environment>,
) -> Result<Vec<ReleasePlan>> {
    let mut selector = LabelSelector::new();
    if let Some(env) = environment {
        selector = selector.with(ENVIRONMENT_LABEL, env.as_str());
    }
    let mut plans: Vec<ReleasePlan> = store
        .list_release_plans(namespace, &selector)
        .await?
        .into_iter()
        .filter(|p| application.map_or(true, |app| p.spec.application == app))
        .collect();
    plans.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    Ok(plans)
}

pub struct ManifestGenerator<'a> {
    store: &'a dyn RecordStore,
    images: &'a dyn ImageInspector,
    context: &'a ApplicationContext,
}

impl<'a> ManifestGenerator<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        images: &'a dyn ImageInspector,
        context: &'a ApplicationContext,
    ) -> Self {
        Self {
            store,
            images,
            context,
        }
    }

    /// Classify the release of `candidate` from its bundle version.
    pub async fn classify_release(&self, candidate: &Snapshot) -> Result<ReleaseType> {
        if self.context.shape == ApplicationShape::Fbc {
            return Ok(ReleaseType::Feature);
        }

        let bundle = &self.context.release_component().metadata.name;
        let image = candidate.component_image(bundle).ok_or_else(|| {
            ReleaseError::MissingSnapshotComponent {
                snapshot: candidate.metadata.name.clone(),
                component: bundle.clone(),
            }
        })?;
        let labels = self.images.inspect(image).await?;
        let raw = labels
            .get(VERSION_LABEL)
            .ok_or_else(|| ReleaseError::MissingVersionLabel {
                image: image.to_string(),
            })?;
        let version = parse_tolerant(raw).map_err(|e| ReleaseError::InvalidVersion {
            version: raw.clone(),
            reason: e.to_string(),
        })?;

        let release_type = ReleaseType::from_version(&version);
        debug!(version = %version, release_type = %release_type, "classified release");
        Ok(release_type)
    }

    /// The release plan of this application for `environment`.
    pub async fn release_plan_for(&self, environment: Environment) -> Result<ReleasePlan> {
        list_release_plans(
            self.store,
            &self.context.namespace,
            Some(self.context.name()),
            Some(environment),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ReleaseError::ReleasePlanNotFound {
            namespace: self.context.namespace.clone(),
            application: self.context.name().to_string(),
            environment: environment.to_string(),
        })
    }

    /// Build the release record for `candidate`. Nothing is persisted.
    #[instrument(skip(self, candidate, notes), fields(snapshot = %candidate.metadata.name))]
    pub async fn generate(
        &self,
        environment: Environment,
        candidate: &Snapshot,
        notes: Option<&ReleaseNote>,
    ) -> Result<Release> {
        let release_type = self.classify_release(candidate).await?;
        let plan = self.release_plan_for(environment).await?;
        let data = ReleaseNote::merged(release_type, notes).to_release_data()?;

        let application = self.context.name();
        let metadata = ObjectMeta {
            generate_name: Some(format!("{application}-{environment}-")),
            namespace: self.context.namespace.clone(),
            ..Default::default()
        }
        .with_label(APPLICATION_LABEL, application)
        .with_label(
            COMPONENT_LABEL,
            self.context.release_component().metadata.name.as_str(),
        );

        Ok(Release {
            metadata,
            spec: ReleaseSpec {
                snapshot: candidate.metadata.name.clone(),
                release_plan: plan.metadata.name,
                data: Some(data),
            },
            status: ReleaseStatus::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_type_follows_patch_component() {
        let v = |s: &str| parse_tolerant(s).unwrap();
        assert_eq!(ReleaseType::from_version(&v("1.0.0")), ReleaseType::Feature);
        assert_eq!(ReleaseType::from_version(&v("1.0.0-alpha.1")), ReleaseType::Feature);
        assert_eq!(ReleaseType::from_version(&v("1.0.1")), ReleaseType::Bugfix);
        assert_eq!(ReleaseType::from_version(&v("1.0.1+build.123")), ReleaseType::Bugfix);
        assert_eq!(ReleaseType::from_version(&v("v2.3")), ReleaseType::Feature);
    }

    #[test]
    fn release_type_parses_advisory_codes() {
        assert_eq!("RHSA".parse::<ReleaseType>().unwrap(), ReleaseType::Security);
        assert!("RHXA".parse::<ReleaseType>().is_err());
        assert_eq!(ReleaseType::Bugfix.to_string(), "RHBA");
    }

    #[test]
    fn environment_accepts_only_known_values() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("dev".parse::<Environment>().is_err());
        assert_eq!(Environment::default(), Environment::Staging);
    }

    #[test]
    fn notes_payload_uses_release_notes_key() {
        let data = ReleaseNote::new(ReleaseType::Bugfix).to_release_data().unwrap();
        assert_eq!(data, serde_json::json!({"releaseNotes": {"type": "RHBA"}}));
    }

    #[test]
    fn merge_keeps_caller_details_and_security_type() {
        let supplied = ReleaseNote {
            release_type: ReleaseType::Feature,
            references: vec!["https://docs.example/notes".to_string()],
            ..Default::default()
        };
        let merged = ReleaseNote::merged(ReleaseType::Bugfix, Some(&supplied));
        assert_eq!(merged.release_type, ReleaseType::Bugfix);
        assert_eq!(merged.references, supplied.references);

        let security = ReleaseNote::new(ReleaseType::Security);
        let merged = ReleaseNote::merged(ReleaseType::Feature, Some(&security));
        assert_eq!(merged.release_type, ReleaseType::Security);
    }

    #[test]
    fn notes_round_trip_through_release() {
        let notes = ReleaseNote::new(ReleaseType::Feature);
        let release = Release {
            spec: ReleaseSpec {
                data: Some(notes.to_release_data().unwrap()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(ReleaseNote::from_release(&release), Some(notes));
        assert_eq!(ReleaseNote::from_release(&Release::default()), None);
    }
}
