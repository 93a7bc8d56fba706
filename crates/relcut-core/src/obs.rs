//! Structured observability hooks for candidate selection and release
//! lifecycle events.
//!
//! This module provides:
//! - Release-scoped tracing spans via the `ReleaseSpan` RAII guard
//! - Emission functions with a stable `event` field for log pipelines
//!
//! Events are emitted at `info!` level unless noted. Set `RUST_LOG` to
//! filter and pass `--json` to the CLI for JSON output.

use std::time::Duration;

use tracing::{info, warn};

/// RAII guard that enters a release-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = ReleaseSpan::enter("demo-staging-x7k2p");
/// // every event logged here carries release = "demo-staging-x7k2p"
/// ```
pub struct ReleaseSpan {
    _span: tracing::span::EnteredSpan,
}

impl ReleaseSpan {
    pub fn enter(release: &str) -> Self {
        Self {
            _span: release_span(release).entered(),
        }
    }
}

/// Span tagged with the release name, for instrumenting futures that move
/// between threads.
pub fn release_span(release: &str) -> tracing::Span {
    tracing::info_span!("relcut.release", release = %release)
}

/// Emit event: a snapshot was chosen for release.
pub fn emit_candidate_selected(snapshot: &str, component: &str, forced: bool) {
    info!(
        event = "candidate.selected",
        snapshot = %snapshot,
        component = %component,
        forced = forced,
    );
}

/// Emit event: a snapshot was skipped (debug level, one per snapshot).
pub fn emit_candidate_rejected(snapshot: &str, reason: &str) {
    tracing::debug!(event = "candidate.rejected", snapshot = %snapshot, reason = %reason);
}

/// Emit event: a release record was submitted.
pub fn emit_release_created(namespace: &str, release: &str, snapshot: &str, dry_run: bool) {
    info!(
        event = "release.created",
        namespace = %namespace,
        release = %release,
        snapshot = %snapshot,
        dry_run = dry_run,
    );
}

/// Emit event: the release pipeline is still running.
pub fn emit_release_progressing(release: &str, elapsed: Duration) {
    info!(
        event = "release.progressing",
        release = %release,
        elapsed_secs = elapsed.as_secs(),
    );
}

/// Emit event: the release reached a terminal state.
pub fn emit_release_finished(release: &str, succeeded: bool, elapsed: Duration) {
    info!(
        event = "release.finished",
        release = %release,
        succeeded = succeeded,
        elapsed_secs = elapsed.as_secs(),
    );
}

/// Emit event: stopped waiting before the release finished (warning level).
pub fn emit_release_timed_out(release: &str, waited: Duration) {
    warn!(
        event = "release.timed_out",
        release = %release,
        waited_secs = waited.as_secs(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_span_enter_and_emitters_do_not_panic() {
        let _span = ReleaseSpan::enter("demo-staging-abcde");
        emit_candidate_selected("snap", "demo-bundle", false);
        emit_candidate_rejected("snap", "digest mismatch");
        emit_release_created("tenant", "demo-staging-abcde", "snap", true);
        emit_release_progressing("demo-staging-abcde", Duration::from_secs(90));
        emit_release_finished("demo-staging-abcde", true, Duration::from_secs(120));
        emit_release_timed_out("demo-staging-abcde", Duration::from_secs(3600));
    }
}
