//! End-to-end release flows against the in-memory record store and the
//! static image and version fakes.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use relcut_core::fakes::{StaticImageInspector, StaticVersionResolver};
use relcut_core::*;
use relcut_state::fakes::{MemoryRecordStore, ScriptedEvent};
use relcut_state::labels::*;
use relcut_state::{
    ApiStatus, Condition, ObjectMeta, ReleasePlanSpec, ReleaseSpec, ReleaseStatus,
    SnapshotComponent, SnapshotSpec, SnapshotStatus, WatchEvent, FINISHED_REASON,
    MANAGED_PIPELINE_CONDITION, TEST_SUCCEEDED_CONDITION,
};

const NS: &str = "tenant";
const BUNDLE_REPO: &str = "quay.io/org/demo-bundle";
const CONTROLLER_REPO: &str = "quay.io/org/demo-controller";
const CONTROLLER_RELEASED_REPO: &str = "registry.example.com/org/demo-controller";
const GIT_URL: &str = "https://git.example.com/org/demo";

struct Fixture {
    store: MemoryRecordStore,
    images: StaticImageInspector,
    versions: StaticVersionResolver,
}

impl Fixture {
    /// Operator application `demo` with a bundle and one satellite, plus a
    /// staging release plan.
    fn operator() -> Self {
        let store = MemoryRecordStore::new();
        store.insert_application(application("demo", OPERATOR_APPLICATION_TYPE));
        store.insert_component(Component::new(
            ObjectMeta::new(NS, "demo-bundle").with_label(COMPONENT_TYPE_LABEL, COMPONENT_BUNDLE_TYPE),
            "demo",
        ));
        store.insert_component(Component::new(
            ObjectMeta::new(NS, "demo-controller").with_label(BUNDLE_REFERENCE_LABEL, "controller"),
            "demo",
        ));
        store.insert_release_plan(plan("demo-staging", "demo", "staging"));
        Self {
            store,
            images: StaticImageInspector::new(),
            versions: StaticVersionResolver::new(),
        }
    }

    fn fbc() -> Self {
        let store = MemoryRecordStore::new();
        store.insert_application(application("catalog", FBC_APPLICATION_TYPE));
        store.insert_component(Component::new(ObjectMeta::new(NS, "catalog-fbc"), "catalog"));
        store.insert_release_plan(plan("catalog-staging", "catalog", "staging"));
        Self {
            store,
            images: StaticImageInspector::new(),
            versions: StaticVersionResolver::new(),
        }
    }

    fn deps(&self) -> Collaborators<'_> {
        Collaborators {
            store: &self.store,
            images: &self.images,
            versions: &self.versions,
        }
    }

    /// Register a finished push snapshot of `demo` built `minute` minutes
    /// into the day, whose bundle (digest `b<minute>`) references the
    /// controller digest `embedded` while the snapshot carries `actual`.
    fn operator_snapshot(&self, name: &str, minute: u32, embedded: &str, actual: &str, version: &str) {
        let bundle = format!("{BUNDLE_REPO}@sha256:b{minute}");
        let controller = format!("{CONTROLLER_REPO}@sha256:{actual}");
        self.images.insert(
            &bundle,
            [
                ("version".to_string(), version.to_string()),
                (
                    "controller".to_string(),
                    format!("{CONTROLLER_RELEASED_REPO}@sha256:{embedded}"),
                ),
            ],
        );
        self.images.insert(&controller, [("version", version)]);

        let revision = format!("rev{minute}");
        self.store.insert_snapshot(snapshot(
            name,
            "demo",
            "demo-bundle",
            minute,
            vec![
                SnapshotComponent::new("demo-bundle", bundle).with_git_source(GIT_URL, &revision),
                SnapshotComponent::new("demo-controller", controller)
                    .with_git_source(GIT_URL, &revision),
            ],
        ));
    }

    fn succeeded_release(&self, name: &str, snapshot: &str) {
        self.store.insert_release(Release {
            metadata: ObjectMeta::new(NS, name)
                .with_label(APPLICATION_LABEL, "demo")
                .with_creation_timestamp(at(30)),
            spec: ReleaseSpec {
                snapshot: snapshot.to_string(),
                release_plan: "demo-staging".to_string(),
                data: None,
            },
            status: ReleaseStatus::with_released("Succeeded", ""),
        });
    }
}

fn at(minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, minute, 0).unwrap()
}

fn application(name: &str, app_type: &str) -> Application {
    Application {
        metadata: ObjectMeta::new(NS, name).with_label(APPLICATION_TYPE_LABEL, app_type),
        ..Default::default()
    }
}

fn plan(name: &str, app: &str, env: &str) -> ReleasePlan {
    ReleasePlan {
        metadata: ObjectMeta::new(NS, name).with_label(ENVIRONMENT_LABEL, env),
        spec: ReleasePlanSpec {
            application: app.to_string(),
            target: Some("managed-tenant".to_string()),
        },
    }
}

fn snapshot(
    name: &str,
    app: &str,
    component: &str,
    minute: u32,
    components: Vec<SnapshotComponent>,
) -> Snapshot {
    Snapshot {
        metadata: ObjectMeta::new(NS, name)
            .with_label(APPLICATION_LABEL, app)
            .with_label(COMPONENT_LABEL, component)
            .with_label(EVENT_TYPE_LABEL, PUSH_EVENT_TYPE)
            .with_label(SHA_LABEL, format!("sha{minute}"))
            .with_creation_timestamp(at(minute)),
        spec: SnapshotSpec {
            application: app.to_string(),
            components,
        },
        status: SnapshotStatus {
            conditions: vec![Condition::new(
                TEST_SUCCEEDED_CONDITION,
                "True",
                FINISHED_REASON,
                "All integration pipelines finished",
            )],
        },
    }
}

fn release_type_of(release: &Release) -> ReleaseType {
    ReleaseNote::from_release(release)
        .expect("release notes recorded")
        .release_type
}

// ===========================================================================
// Full flow
// ===========================================================================

#[tokio::test]
async fn bugfix_release_is_created_and_tracked_to_success() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.1");
    fx.store.script_watch(
        "demo-staging-",
        vec![
            ScriptedEvent::Status(ReleaseStatus::with_released("Progressing", "")),
            ScriptedEvent::Status(
                ReleaseStatus::with_released("Succeeded", "")
                    .with_artifacts(serde_json::json!({"advisory": "RHBA-2025:0001"})),
            ),
            ScriptedEvent::Close,
        ],
    );

    let config = ReleaseConfig::new(NS, "demo");
    let (created, completion) = release_and_wait(fx.deps(), &config).await.unwrap();

    assert!(created.metadata.name.starts_with("demo-staging-"));
    assert_eq!(created.spec.snapshot, "demo-snap-1");
    assert_eq!(created.spec.release_plan, "demo-staging");
    assert_eq!(release_type_of(&created), ReleaseType::Bugfix);
    assert_eq!(created.metadata.label(APPLICATION_LABEL), Some("demo"));
    assert_eq!(created.metadata.label(COMPONENT_LABEL), Some("demo-bundle"));
    assert_eq!(fx.store.created_releases().len(), 1);

    match completion {
        Some(Completion::Succeeded { release, artifacts }) => {
            assert_eq!(release, created.metadata.name);
            assert_eq!(artifacts.unwrap()["advisory"], "RHBA-2025:0001");
        }
        other => panic!("unexpected completion: {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_generates_a_name_but_persists_nothing() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");

    let config = ReleaseConfig::new(NS, "demo").with_dry_run(true);
    let (created, completion) = release_and_wait(fx.deps(), &config).await.unwrap();

    assert!(created.metadata.name.starts_with("demo-staging-"));
    assert!(completion.is_none());
    assert!(fx.store.created_releases().is_empty());
}

#[tokio::test]
async fn failed_release_reports_pipeline_message() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.store.script_watch(
        "demo-staging-",
        vec![ScriptedEvent::Status(
            ReleaseStatus::with_released("Failed", "Release processing failed").with_condition(
                Condition::new(
                    MANAGED_PIPELINE_CONDITION,
                    "False",
                    "Failed",
                    "task push-snapshot failed",
                ),
            ),
        )],
    );

    let err = release_and_wait(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    match err {
        ReleaseError::ReleaseFailed { release, message } => {
            assert!(release.starts_with("demo-staging-"));
            assert_eq!(message, "task push-snapshot failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn silent_pipeline_times_out_without_error() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.store.script_watch(
        "demo-staging-",
        vec![ScriptedEvent::Status(ReleaseStatus::with_released(
            "Progressing",
            "",
        ))],
    );

    let config = ReleaseConfig::new(NS, "demo").with_timeout(Duration::from_secs(30));
    let (created, completion) = release_and_wait(fx.deps(), &config).await.unwrap();

    assert_eq!(
        completion,
        Some(Completion::TimedOut {
            release: created.metadata.name.clone(),
            waited: Duration::from_secs(30),
        })
    );
}

#[tokio::test]
async fn deleted_release_is_an_error() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.store.script_watch(
        "demo-staging-",
        vec![
            ScriptedEvent::Status(ReleaseStatus::with_released("Progressing", "")),
            ScriptedEvent::Deleted,
        ],
    );

    let err = release_and_wait(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::ReleaseDeleted { .. }));
}

#[tokio::test]
async fn watch_error_event_ends_the_wait() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.store.script_watch(
        "demo-staging-",
        vec![
            ScriptedEvent::Status(ReleaseStatus::with_released("Progressing", "")),
            ScriptedEvent::Raw(WatchEvent::Error(ApiStatus {
                message: "too old resource version".to_string(),
                reason: "Expired".to_string(),
                code: 410,
            })),
        ],
    );

    let err = release_and_wait(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    match err {
        ReleaseError::Storage(StorageError::Watch { name, message }) => {
            assert!(name.starts_with("demo-staging-"));
            assert_eq!(message, "too old resource version");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn closed_watch_without_outcome_is_an_error() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.store.script_watch(
        "demo-staging-",
        vec![
            ScriptedEvent::Status(ReleaseStatus::with_released("Progressing", "")),
            ScriptedEvent::Close,
        ],
    );

    let err = release_and_wait(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::WatchClosed { .. }));
}

// ===========================================================================
// Candidate selection
// ===========================================================================

#[tokio::test]
async fn digest_mismatch_leaves_no_candidate() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c0", "c1", "1.0.0");

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::NoCandidate { cutoff: None, .. }));
    assert!(err.to_string().contains("demo-bundle"));
    assert!(!err.is_configuration());
}

#[tokio::test]
async fn newest_valid_snapshot_wins_over_newer_invalid_one() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-old", 1, "c1", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-mid", 2, "c2", "c2", "1.0.0");
    fx.operator_snapshot("demo-snap-new", 3, "c2", "c3", "1.0.0");

    let manifest = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap();
    assert_eq!(manifest.spec.snapshot, "demo-snap-mid");
}

#[tokio::test]
async fn version_mismatch_between_bundle_and_satellite_rejects() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.images
        .insert(&format!("{CONTROLLER_REPO}@sha256:c1"), [("version", "0.9.0")]);

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::NoCandidate { .. }));
}

#[tokio::test]
async fn unfinished_snapshot_is_skipped() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-2", 2, "c2", "c2", "1.0.0");
    let mut pending = fx.store.get_snapshot(NS, "demo-snap-2").await.unwrap();
    pending.status.conditions.clear();
    fx.store.insert_snapshot(pending);

    let manifest = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap();
    assert_eq!(manifest.spec.snapshot, "demo-snap-1");
}

#[tokio::test]
async fn cutoff_snapshot_is_never_reselected_without_force() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-released", 1, "c1", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-new", 2, "c0", "c2", "1.0.0");
    fx.succeeded_release("demo-staging-aaaaa", "demo-snap-released");

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    match err {
        ReleaseError::NoCandidate { cutoff, .. } => {
            assert_eq!(cutoff.as_deref(), Some("demo-snap-released"))
        }
        other => panic!("unexpected error: {other}"),
    }

    let forced = ReleaseConfig::new(NS, "demo").with_force_release(true);
    let manifest = generate_release_manifest(fx.deps(), &forced).await.unwrap();
    assert_eq!(manifest.spec.snapshot, "demo-snap-released");
}

#[tokio::test]
async fn snapshots_older_than_cutoff_are_not_considered() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-ancient", 1, "c1", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-released", 2, "c2", "c2", "1.0.0");
    fx.succeeded_release("demo-staging-aaaaa", "demo-snap-released");

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::NoCandidate { .. }));
}

#[tokio::test]
async fn pinned_cutoff_outside_push_history_still_bounds_the_walk() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-old", 1, "c1", "c1", "1.0.0");
    // released by pin: carries no push event label, so it is not listed
    let mut pinned = snapshot(
        "demo-snap-pinned",
        "demo",
        "demo-bundle",
        5,
        vec![SnapshotComponent::new(
            "demo-bundle",
            format!("{BUNDLE_REPO}@sha256:p5"),
        )],
    );
    pinned.metadata.labels.remove(EVENT_TYPE_LABEL);
    fx.store.insert_snapshot(pinned);
    fx.images
        .insert(&format!("{BUNDLE_REPO}@sha256:p5"), [("version", "1.0.0")]);
    fx.succeeded_release("demo-staging-aaaaa", "demo-snap-pinned");

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    match err {
        ReleaseError::NoCandidate { cutoff, .. } => {
            assert_eq!(cutoff.as_deref(), Some("demo-snap-pinned"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fx.images.calls().is_empty());

    let forced = ReleaseConfig::new(NS, "demo").with_force_release(true);
    let manifest = generate_release_manifest(fx.deps(), &forced).await.unwrap();
    assert_eq!(manifest.spec.snapshot, "demo-snap-pinned");
}

#[tokio::test]
async fn validation_is_idempotent() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-good", 1, "c1", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-bad", 2, "c0", "c2", "1.0.0");
    let context = ApplicationContext::load(&fx.store, NS, "demo").await.unwrap();
    let selector = CandidateSelector::new(&fx.store, &fx.images, &context);

    for name in ["demo-snap-good", "demo-snap-bad"] {
        let snap = fx.store.get_snapshot(NS, name).await.unwrap();
        let first = selector.validate_candidacy("demo-bundle", &snap).await.unwrap();
        let second = selector.validate_candidacy("demo-bundle", &snap).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, name == "demo-snap-good");
    }
}

// ===========================================================================
// Configuration errors
// ===========================================================================

#[tokio::test]
async fn satellite_without_bundle_reference_is_a_hard_error() {
    let fx = Fixture::operator();
    fx.store
        .insert_component(Component::new(ObjectMeta::new(NS, "demo-controller"), "demo"));
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::MissingLabel {
            label: BUNDLE_REFERENCE_LABEL,
            ..
        }
    ));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn missing_release_plan_is_reported_for_the_environment() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");

    let config = ReleaseConfig::new(NS, "demo").with_environment(Environment::Production);
    let err = generate_release_manifest(fx.deps(), &config)
        .await
        .unwrap_err();
    match err {
        ReleaseError::ReleasePlanNotFound { environment, .. } => {
            assert_eq!(environment, "production")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_application_type_is_rejected() {
    let fx = Fixture::operator();
    fx.store.insert_application(application("demo", "helm"));

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::UnsupportedApplicationType { .. }));
}

// ===========================================================================
// Classification
// ===========================================================================

#[tokio::test]
async fn prerelease_and_build_metadata_classify_by_patch() {
    for (version, expected) in [
        ("1.0.0-alpha.1", ReleaseType::Feature),
        ("1.0.1+build.123", ReleaseType::Bugfix),
        ("v2.1", ReleaseType::Feature),
    ] {
        let fx = Fixture::operator();
        fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", version);
        let manifest = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "demo"))
            .await
            .unwrap();
        assert_eq!(release_type_of(&manifest), expected, "version {version}");
    }
}

#[tokio::test]
async fn fbc_release_is_always_a_feature_release() {
    let fx = Fixture::fbc();
    let image = "quay.io/org/catalog@sha256:f1";
    fx.images.insert(image, [("version", "4.16.3")]);
    fx.store.insert_snapshot(snapshot(
        "catalog-snap-1",
        "catalog",
        "catalog-fbc",
        1,
        vec![SnapshotComponent::new("catalog-fbc", image)],
    ));

    let manifest = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "catalog"))
        .await
        .unwrap();
    assert_eq!(manifest.spec.snapshot, "catalog-snap-1");
    assert_eq!(manifest.spec.release_plan, "catalog-staging");
    assert_eq!(release_type_of(&manifest), ReleaseType::Feature);
    assert_eq!(fx.images.calls(), vec![image.to_string()]);
}

#[tokio::test]
async fn fbc_snapshot_without_its_component_is_a_hard_error() {
    let fx = Fixture::fbc();
    fx.store
        .insert_snapshot(snapshot("catalog-snap-1", "catalog", "catalog-fbc", 1, vec![]));

    let err = generate_release_manifest(fx.deps(), &ReleaseConfig::new(NS, "catalog"))
        .await
        .unwrap_err();
    match &err {
        ReleaseError::MissingSnapshotComponent { snapshot, component } => {
            assert_eq!(snapshot, "catalog-snap-1");
            assert_eq!(component, "catalog-fbc");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_configuration());
}

#[tokio::test]
async fn supplied_security_notes_survive_classification() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.1");
    let mut notes = ReleaseNote::new(ReleaseType::Security);
    notes.references.push("https://access.example.com/errata".to_string());

    let config = ReleaseConfig::new(NS, "demo").with_release_notes(notes);
    let manifest = generate_release_manifest(fx.deps(), &config).await.unwrap();
    let recorded = ReleaseNote::from_release(&manifest).unwrap();
    assert_eq!(recorded.release_type, ReleaseType::Security);
    assert_eq!(recorded.references.len(), 1);
}

// ===========================================================================
// Pinned and version-filtered snapshots
// ===========================================================================

#[tokio::test]
async fn pinned_snapshot_bypasses_candidate_validation() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c0", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-2", 2, "c2", "c2", "1.0.0");

    let by_name = ReleaseConfig::new(NS, "demo").with_snapshot("demo-snap-1");
    let manifest = generate_release_manifest(fx.deps(), &by_name).await.unwrap();
    assert_eq!(manifest.spec.snapshot, "demo-snap-1");

    let by_sha = ReleaseConfig::new(NS, "demo").with_sha("sha1");
    let manifest = generate_release_manifest(fx.deps(), &by_sha).await.unwrap();
    assert_eq!(manifest.spec.snapshot, "demo-snap-1");

    let missing = ReleaseConfig::new(NS, "demo").with_snapshot("demo-snap-9");
    let err = generate_release_manifest(fx.deps(), &missing)
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::SnapshotNotFound { .. }));
}

#[tokio::test]
async fn version_filter_selects_matching_snapshot_and_cleans_up_once() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-2", 2, "c2", "c2", "1.1.0");
    fx.versions.insert(GIT_URL, "rev1", "1.0.0");
    fx.versions.insert(GIT_URL, "rev2", "1.1.0");

    let config = ReleaseConfig::new(NS, "demo").with_version("v1.0");
    let manifest = generate_release_manifest(fx.deps(), &config).await.unwrap();
    assert_eq!(manifest.spec.snapshot, "demo-snap-1");
    assert_eq!(fx.versions.cleanup_count(), 1);
}

#[tokio::test]
async fn version_filter_without_match_reports_version() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.versions.insert(GIT_URL, "rev1", "1.0.0");

    let config = ReleaseConfig::new(NS, "demo").with_version("2.0.0");
    let err = generate_release_manifest(fx.deps(), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::NoSnapshotForVersion { .. }));
    assert_eq!(fx.versions.cleanup_count(), 1);
}

#[tokio::test]
async fn listing_is_newest_first_for_the_release_component() {
    let fx = Fixture::operator();
    fx.operator_snapshot("demo-snap-1", 1, "c1", "c1", "1.0.0");
    fx.operator_snapshot("demo-snap-2", 2, "c2", "c2", "1.0.0");
    let context = ApplicationContext::load(&fx.store, NS, "demo").await.unwrap();

    let names: Vec<String> = list_snapshots(fx.deps(), &context, None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.metadata.name)
        .collect();
    assert_eq!(names, vec!["demo-snap-2", "demo-snap-1"]);
}
