//! Release completion tracking.
//!
//! Consumes a watch on one release until its `Released` condition reaches
//! `Succeeded` or `Failed`. A timer running next to the consumer stops the
//! subscription when the timeout elapses; the consumer then reports a
//! timeout instead of an error, since the pipeline may still finish.

use std::fmt;
use std::time::Duration;

use relcut_state::{
    RecordStore, Release, StorageError, WatchEvent, MANAGED_PIPELINE_CONDITION,
    PIPELINE_PROCESSED_SUFFIX,
};
use tokio::time::Instant;
use tracing::{debug, info, Instrument};

use crate::error::{ReleaseError, Result};
use crate::obs;

/// Where a release stands according to its `Released` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    /// No `Released` condition yet.
    Unknown,
    Progressing,
    Succeeded,
    Failed,
}

impl CompletionState {
    pub fn of(release: &Release) -> Self {
        match release.released_reason() {
            None => CompletionState::Unknown,
            Some("Succeeded") => CompletionState::Succeeded,
            Some("Failed") => CompletionState::Failed,
            Some(_) => CompletionState::Progressing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CompletionState::Succeeded | CompletionState::Failed)
    }
}

impl fmt::Display for CompletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompletionState::Unknown => "Unknown",
            CompletionState::Progressing => "Progressing",
            CompletionState::Succeeded => "Succeeded",
            CompletionState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Non-error outcome of waiting for a release.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Succeeded {
        release: String,
        artifacts: Option<serde_json::Value>,
    },
    /// Stopped waiting; the release may still complete later.
    TimedOut { release: String, waited: Duration },
}

/// Most specific failure message available on a failed release.
///
/// A failed pipeline-processing condition carries the pipeline's own
/// diagnostic and takes precedence over the generic `Released` message.
pub fn failure_message(release: &Release) -> String {
    let conditions = &release.status.conditions;
    let pipeline = conditions
        .iter()
        .filter(|c| c.type_.ends_with(PIPELINE_PROCESSED_SUFFIX) && c.reason == "Failed")
        .filter(|c| !c.message.is_empty())
        .min_by_key(|c| c.type_ != MANAGED_PIPELINE_CONDITION);
    if let Some(condition) = pipeline {
        return condition.message.clone();
    }
    release
        .status
        .released_condition()
        .map(|c| c.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "release failed without a message".to_string())
}

/// Wait for `release` to finish, at most `timeout`.
pub async fn await_completion(
    store: &dyn RecordStore,
    release: &Release,
    timeout: Duration,
) -> Result<Completion> {
    let span = obs::release_span(&release.metadata.name);
    watch_until_terminal(store, release, timeout)
        .instrument(span)
        .await
}

async fn watch_until_terminal(
    store: &dyn RecordStore,
    release: &Release,
    timeout: Duration,
) -> Result<Completion> {
    let namespace = &release.metadata.namespace;
    let name = release.metadata.name.clone();

    let mut subscription = store.watch_release(namespace, &name).await?;
    let stop = subscription.stop_handle();
    let timer = {
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            stop.stop();
        })
    };
    let _timer = AbortOnDrop(timer);

    let started = Instant::now();
    let mut state = CompletionState::Unknown;
    info!(release = %name, timeout_secs = timeout.as_secs(), "waiting for release to complete");

    while let Some(event) = subscription.next().await {
        let current = match event? {
            WatchEvent::Added(r) | WatchEvent::Modified(r) => r,
            WatchEvent::Deleted(_) => {
                return Err(ReleaseError::ReleaseDeleted { release: name });
            }
            WatchEvent::Bookmark(_) => continue,
            WatchEvent::Error(status) => {
                return Err(StorageError::Watch {
                    name,
                    message: status.message,
                }
                .into());
            }
        };

        let next = CompletionState::of(&current);
        if next != state {
            debug!(from = %state, to = %next, "release state changed");
        }
        state = next;
        match state {
            CompletionState::Unknown => {}
            CompletionState::Progressing => {
                obs::emit_release_progressing(&name, started.elapsed());
            }
            CompletionState::Failed => {
                obs::emit_release_finished(&name, false, started.elapsed());
                return Err(ReleaseError::ReleaseFailed {
                    message: failure_message(&current),
                    release: name,
                });
            }
            CompletionState::Succeeded => {
                obs::emit_release_finished(&name, true, started.elapsed());
                return Ok(Completion::Succeeded {
                    release: name,
                    artifacts: current.status.artifacts,
                });
            }
        }
    }

    if stop.is_stopped() {
        obs::emit_release_timed_out(&name, timeout);
        return Ok(Completion::TimedOut {
            release: name,
            waited: timeout,
        });
    }
    Err(ReleaseError::WatchClosed { release: name })
}

struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relcut_state::{Condition, ReleaseStatus};

    fn failed_release(conditions: Vec<Condition>) -> Release {
        let mut status = ReleaseStatus::with_released("Failed", "Release processing failed");
        status.conditions.extend(conditions);
        Release {
            status,
            ..Default::default()
        }
    }

    #[test]
    fn state_follows_released_reason() {
        let mut release = Release::default();
        assert_eq!(CompletionState::of(&release), CompletionState::Unknown);
        release.status = ReleaseStatus::with_released("Progressing", "");
        assert_eq!(CompletionState::of(&release), CompletionState::Progressing);
        assert!(!CompletionState::Progressing.is_terminal());
        release.status = ReleaseStatus::with_released("Succeeded", "");
        assert!(CompletionState::of(&release).is_terminal());
    }

    #[test]
    fn failure_prefers_pipeline_diagnostic() {
        let release = failed_release(vec![Condition::new(
            MANAGED_PIPELINE_CONDITION,
            "False",
            "Failed",
            "task verify-conforma failed",
        )]);
        assert_eq!(failure_message(&release), "task verify-conforma failed");
    }

    #[test]
    fn failure_falls_back_to_released_message() {
        let release = failed_release(vec![Condition::new(
            MANAGED_PIPELINE_CONDITION,
            "True",
            "Succeeded",
            "pipeline ok",
        )]);
        assert_eq!(failure_message(&release), "Release processing failed");
    }

    #[test]
    fn managed_pipeline_wins_over_other_pipeline_conditions() {
        let release = failed_release(vec![
            Condition::new("TenantPipelineProcessed", "False", "Failed", "tenant broke"),
            Condition::new(MANAGED_PIPELINE_CONDITION, "False", "Failed", "managed broke"),
        ]);
        assert_eq!(failure_message(&release), "managed broke");
    }
}
