//! End-to-end release operations: generate a manifest, create it and wait
//! for the pipeline.

use relcut_state::{RecordStore, Release, Snapshot};
use tracing::info;

use crate::classifier::ApplicationContext;
use crate::config::ReleaseConfig;
use crate::error::Result;
use crate::image::ImageInspector;
use crate::manifest::ManifestGenerator;
use crate::obs;
use crate::selector::CandidateSelector;
use crate::snapshots::{find_snapshot, list_push_snapshots, snapshots_for_version};
use crate::tracker::{await_completion, Completion};
use crate::version::VersionResolver;

/// External collaborators of a release run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub store: &'a dyn RecordStore,
    pub images: &'a dyn ImageInspector,
    pub versions: &'a dyn VersionResolver,
}

/// Push snapshots of the application's release component, newest first,
/// restricted to `config.version` when set.
pub async fn list_snapshots(
    deps: Collaborators<'_>,
    context: &ApplicationContext,
    version: Option<&str>,
) -> Result<Vec<Snapshot>> {
    let component = &context.release_component().metadata.name;
    let snapshots = list_push_snapshots(deps.store, &context.namespace, component).await?;
    match version {
        Some(version) => {
            snapshots_for_version(
                deps.versions,
                snapshots,
                &context.namespace,
                context.name(),
                version,
            )
            .await
        }
        None => Ok(snapshots),
    }
}

/// The snapshot a run would release: the pinned one, or the newest valid
/// candidate.
pub async fn resolve_candidate(
    deps: Collaborators<'_>,
    context: &ApplicationContext,
    config: &ReleaseConfig,
) -> Result<Snapshot> {
    if config.is_pinned() {
        return find_snapshot(
            deps.store,
            &config.namespace,
            Some(&config.application),
            config.snapshot.as_deref(),
            config.sha.as_deref(),
        )
        .await;
    }
    let selector = CandidateSelector::new(deps.store, deps.images, context);
    let snapshots = list_snapshots(deps, context, config.version.as_deref()).await?;
    selector.select_from(snapshots, config.force_release).await
}

/// Classify the application, pick the snapshot and build its release.
pub async fn generate_release_manifest(
    deps: Collaborators<'_>,
    config: &ReleaseConfig,
) -> Result<Release> {
    let context = ApplicationContext::load(deps.store, &config.namespace, &config.application)
        .await?;
    let candidate = resolve_candidate(deps, &context, config).await?;
    ManifestGenerator::new(deps.store, deps.images, &context)
        .generate(
            config.environment,
            &candidate,
            config.release_notes.as_ref(),
        )
        .await
}

/// Submit a generated release.
pub async fn create_release(
    store: &dyn RecordStore,
    manifest: &Release,
    dry_run: bool,
) -> Result<Release> {
    let created = store.create_release(manifest, dry_run).await?;
    obs::emit_release_created(
        &created.metadata.namespace,
        &created.metadata.name,
        &created.spec.snapshot,
        dry_run,
    );
    Ok(created)
}

/// Generate, create and, unless dry-running, wait for a release.
///
/// Returns the created release and the wait outcome (`None` for dry runs).
pub async fn release_and_wait(
    deps: Collaborators<'_>,
    config: &ReleaseConfig,
) -> Result<(Release, Option<Completion>)> {
    let manifest = generate_release_manifest(deps, config).await?;
    let created = create_release(deps.store, &manifest, config.dry_run).await?;
    if config.dry_run {
        return Ok((created, None));
    }
    info!(release = %created.metadata.name, "release created");
    let completion = await_completion(deps.store, &created, config.timeout).await?;
    Ok((created, Some(completion)))
}

/// Reason of the `Released` condition, or `Unknown` when not reported yet.
pub fn release_status(release: &Release) -> &str {
    release.released_reason().unwrap_or("Unknown")
}
