//! Snapshot lookup: push-built snapshots, pinned snapshots and
//! version-filtered listings.

use std::cmp::Ordering;

use relcut_state::labels::{
    APPLICATION_LABEL, COMPONENT_LABEL, EVENT_TYPE_LABEL, PUSH_EVENT_TYPE, SHA_LABEL,
};
use relcut_state::{LabelSelector, RecordStore, Snapshot};
use semver::Version;
use tracing::debug;

use crate::error::{ReleaseError, Result};
use crate::version::{parse_tolerant, ResolverScope, VersionResolver};

/// Sort newest first by creation time; undated records go last.
pub fn sort_newest_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| {
        b.metadata
            .creation_timestamp
            .cmp(&a.metadata.creation_timestamp)
    });
}

/// Push-triggered snapshots built for `component`, newest first.
pub async fn list_push_snapshots(
    store: &dyn RecordStore,
    namespace: &str,
    component: &str,
) -> Result<Vec<Snapshot>> {
    let selector = LabelSelector::new()
        .with(EVENT_TYPE_LABEL, PUSH_EVENT_TYPE)
        .with(COMPONENT_LABEL, component);
    let mut snapshots = store.list_snapshots(namespace, &selector).await?;
    sort_newest_first(&mut snapshots);
    debug!(component = %component, count = snapshots.len(), "listed push snapshots");
    Ok(snapshots)
}

/// Look up a snapshot pinned by name and/or commit SHA.
pub async fn find_snapshot(
    store: &dyn RecordStore,
    namespace: &str,
    application: Option<&str>,
    name: Option<&str>,
    sha: Option<&str>,
) -> Result<Snapshot> {
    let mut selector = LabelSelector::new();
    if let Some(app) = application {
        selector = selector.with(APPLICATION_LABEL, app);
    }
    if let Some(sha) = sha {
        selector = selector.with(SHA_LABEL, sha);
    }

    let not_found = || {
        let mut terms = Vec::new();
        if let Some(name) = name {
            terms.push(format!("name={name}"));
        }
        if !selector.is_empty() {
            terms.push(selector.to_query());
        }
        ReleaseError::SnapshotNotFound {
            namespace: namespace.to_string(),
            selector: terms.join(","),
        }
    };

    match name {
        Some(name) => {
            let snapshot = match store.get_snapshot(namespace, name).await {
                Ok(snapshot) => snapshot,
                Err(e) if e.is_not_found() => return Err(not_found()),
                Err(e) => return Err(e.into()),
            };
            if selector.matches(&snapshot.metadata.labels) {
                Ok(snapshot)
            } else {
                Err(not_found())
            }
        }
        None => {
            let mut snapshots = store.list_snapshots(namespace, &selector).await?;
            sort_newest_first(&mut snapshots);
            snapshots.into_iter().next().ok_or_else(not_found)
        }
    }
}

/// Outcome of resolving the source version of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotVersion {
    /// Every component with git provenance declares this version.
    Consistent(Version),
    /// Components disagree on the version.
    Inconsistent,
    /// No component carries git provenance.
    Unknown,
}

pub async fn snapshot_version(
    resolver: &dyn VersionResolver,
    snapshot: &Snapshot,
) -> Result<SnapshotVersion> {
    let mut found: Option<Version> = None;
    for component in &snapshot.spec.components {
        let Some(git) = component.git_source() else {
            debug!(component = %component.name, "git source reference missing");
            continue;
        };
        let version = resolver.resolve_version(&git.url, &git.revision).await?;
        match &found {
            None => found = Some(version),
            Some(existing) if existing.cmp_precedence(&version) != Ordering::Equal => {
                return Ok(SnapshotVersion::Inconsistent)
            }
            Some(_) => {}
        }
    }
    Ok(found.map_or(SnapshotVersion::Unknown, SnapshotVersion::Consistent))
}

/// Keep the snapshots whose source version equals `version`, preserving
/// order. The resolver is cleaned up once, whatever the outcome.
pub async fn snapshots_for_version(
    resolver: &dyn VersionResolver,
    snapshots: Vec<Snapshot>,
    namespace: &str,
    application: &str,
    version: &str,
) -> Result<Vec<Snapshot>> {
    let wanted = parse_tolerant(version).map_err(|e| ReleaseError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })?;
    let scope = ResolverScope::new(resolver);

    let mut matching = Vec::new();
    for snapshot in snapshots {
        match snapshot_version(&*scope, &snapshot).await? {
            SnapshotVersion::Consistent(v) if v.cmp_precedence(&wanted) == Ordering::Equal => {
                matching.push(snapshot)
            }
            SnapshotVersion::Consistent(_) => {}
            SnapshotVersion::Inconsistent => {
                debug!(snapshot = %snapshot.metadata.name, "inconsistent version across components");
            }
            SnapshotVersion::Unknown => {
                debug!(snapshot = %snapshot.metadata.name, "no git provenance, skipping");
            }
        }
    }

    if matching.is_empty() {
        return Err(ReleaseError::NoSnapshotForVersion {
            namespace: namespace.to_string(),
            application: application.to_string(),
            version: version.to_string(),
        });
    }
    Ok(matching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use relcut_state::ObjectMeta;

    fn snap(name: &str, minutes: Option<i64>) -> Snapshot {
        let mut metadata = ObjectMeta::new("tenant", name);
        if let Some(m) = minutes {
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            metadata = metadata.with_creation_timestamp(base + Duration::minutes(m));
        }
        Snapshot {
            metadata,
            ..Default::default()
        }
    }

    #[test]
    fn newest_first_with_undated_last() {
        let mut list = vec![snap("old", Some(1)), snap("undated", None), snap("new", Some(5))];
        sort_newest_first(&mut list);
        let names: Vec<&str> = list.iter().map(|s| s.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["new", "old", "undated"]);
    }
}
