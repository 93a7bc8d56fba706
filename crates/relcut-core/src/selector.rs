//! Candidate selection.
//!
//! Walks push snapshots of the release component newest first and returns
//! the first one whose bundle image agrees with the snapshot about every
//! satellite component. Snapshots at or before the one used by the last
//! successful release are never candidates; `force` only allows falling
//! back to that cutoff snapshot when nothing newer validates.

use relcut_state::labels::APPLICATION_LABEL;
use relcut_state::{LabelSelector, RecordStore, Release, Snapshot};
use tracing::{debug, info, instrument};

use crate::classifier::{bundle_reference, ApplicationContext};
use crate::error::{ReleaseError, Result};
use crate::image::{same_digest, ImageInspector, VERSION_LABEL};
use crate::obs;
use crate::snapshots::list_push_snapshots;

/// Releases of `application`, newest first.
pub async fn list_releases(
    store: &dyn RecordStore,
    namespace: &str,
    application: Option<&str>,
) -> Result<Vec<Release>> {
    let mut selector = LabelSelector::new();
    if let Some(app) = application {
        selector = selector.with(APPLICATION_LABEL, app);
    }
    let mut releases = store.list_releases(namespace, &selector).await?;
    releases.sort_by(|a, b| {
        b.metadata
            .creation_timestamp
            .cmp(&a.metadata.creation_timestamp)
    });
    Ok(releases)
}

/// Releases of `application` whose pipeline succeeded, newest first.
pub async fn list_successful_releases(
    store: &dyn RecordStore,
    namespace: &str,
    application: &str,
) -> Result<Vec<Release>> {
    Ok(list_releases(store, namespace, Some(application))
        .await?
        .into_iter()
        .filter(Release::is_succeeded)
        .collect())
}

fn component_image<'s>(snapshot: &'s Snapshot, component: &str) -> Result<&'s str> {
    snapshot
        .component_image(component)
        .ok_or_else(|| ReleaseError::MissingSnapshotComponent {
            snapshot: snapshot.metadata.name.clone(),
            component: component.to_string(),
        })
}

/// Whether `snapshot` is the cutoff itself or was created no later than it.
/// The cutoff need not be a push snapshot, so names alone are not enough.
fn at_or_before(snapshot: &Snapshot, cutoff: &Snapshot) -> bool {
    if snapshot.metadata.name == cutoff.metadata.name {
        return true;
    }
    match (
        snapshot.metadata.creation_timestamp,
        cutoff.metadata.creation_timestamp,
    ) {
        (Some(created), Some(cutoff_created)) => created <= cutoff_created,
        _ => false,
    }
}

pub struct CandidateSelector<'a> {
    store: &'a dyn RecordStore,
    images: &'a dyn ImageInspector,
    context: &'a ApplicationContext,
}

impl<'a> CandidateSelector<'a> {
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

    /// Snapshot used by the most recent successful release, if any.
    pub async fn cutoff_snapshot(&self) -> Result<Option<Snapshot>> {
        let releases =
            list_successful_releases(self.store, &self.context.namespace, self.context.name())
                .await?;
        let Some(last) = releases.first() else {
            return Ok(None);
        };
        debug!(release = %last.metadata.name, snapshot = %last.spec.snapshot, "found cutoff");
        let snapshot = self
            .store
            .get_snapshot(&self.context.namespace, &last.spec.snapshot)
            .await?;
        Ok(Some(snapshot))
    }

    /// Push snapshots of the release component, newest first.
    pub async fn push_snapshots(&self) -> Result<Vec<Snapshot>> {
        list_push_snapshots(
            self.store,
            &self.context.namespace,
            &self.context.release_component().metadata.name,
        )
        .await
    }

    /// Select the newest valid candidate among the push snapshots.
    pub async fn select(&self, force: bool) -> Result<Snapshot> {
        let snapshots = self.push_snapshots().await?;
        self.select_from(snapshots, force).await
    }

    /// Select the newest valid candidate from `snapshots` (newest first).
    #[instrument(skip(self, snapshots), fields(application = %self.context.name()))]
    pub async fn select_from(&self, snapshots: Vec<Snapshot>, force: bool) -> Result<Snapshot> {
        let cutoff = self.cutoff_snapshot().await?;
        let release_component = &self.context.release_component().metadata.name;

        for snapshot in snapshots {
            if cutoff.as_ref().is_some_and(|c| at_or_before(&snapshot, c)) {
                debug!(snapshot = %snapshot.metadata.name, "reached cutoff snapshot");
                break;
            }
            if self.validate_candidacy(release_component, &snapshot).await? {
                obs::emit_candidate_selected(&snapshot.metadata.name, release_component, false);
                return Ok(snapshot);
            }
        }

        match cutoff {
            Some(snapshot) if force => {
                info!(snapshot = %snapshot.metadata.name, "no newer candidate, forcing last released snapshot");
                obs::emit_candidate_selected(&snapshot.metadata.name, release_component, true);
                Ok(snapshot)
            }
            cutoff => Err(ReleaseError::NoCandidate {
                namespace: self.context.namespace.clone(),
                component: release_component.clone(),
                cutoff: cutoff.map(|s| s.metadata.name),
            }),
        }
    }

    /// Whether `snapshot` is a valid release candidate.
    ///
    /// `Ok(false)` is a soft rejection: the snapshot is unfinished or its
    /// bundle disagrees with it about a satellite. Errors are reserved for
    /// broken wiring and upstream failures.
    pub async fn validate_candidacy(&self, bundle: &str, snapshot: &Snapshot) -> Result<bool> {
        let name = &snapshot.metadata.name;
        if !snapshot.has_finished_successfully() {
            obs::emit_candidate_rejected(name, "tests not finished");
            return Ok(false);
        }

        let bundle_image = component_image(snapshot, bundle)?;
        let bundle_labels = self.images.inspect(bundle_image).await?;

        for satellite in self.context.satellites() {
            let component = &satellite.metadata.name;
            let alias = bundle_reference(satellite)?;

            let Some(embedded) = bundle_labels.get(alias) else {
                info!(
                    snapshot = %name,
                    component = %component,
                    alias = %alias,
                    bundle = %bundle_image,
                    "bundle does not reference component"
                );
                obs::emit_candidate_rejected(name, "bundle reference missing");
                return Ok(false);
            };

            let satellite_image = component_image(snapshot, component)?;
            if !same_digest(embedded, satellite_image) {
                info!(
                    snapshot = %name,
                    component = %component,
                    bundle = %bundle,
                    "component pullspec mismatch in bundle"
                );
                obs::emit_candidate_rejected(name, "digest mismatch");
                return Ok(false);
            }

            let satellite_labels = self.images.inspect(satellite_image).await?;
            let bundle_version = bundle_labels.get(VERSION_LABEL);
            let satellite_version = satellite_labels.get(VERSION_LABEL);
            if bundle_version != satellite_version {
                info!(
                    snapshot = %name,
                    component = %component,
                    bundle_version = ?bundle_version,
                    component_version = ?satellite_version,
                    "component and bundle version mismatch"
                );
                obs::emit_candidate_rejected(name, "version mismatch");
                return Ok(false);
            }
        }

        debug!(snapshot = %name, "snapshot is a valid candidate");
        Ok(true)
    }
}
