//! Source-control version resolution.
//!
//! A snapshot component built from git records its repository and revision.
//! [`GitVersionResolver`] clones each repository once into a scratch
//! directory and reads `VERSION.txt` at the requested revision. Scratch
//! directories are released by [`VersionResolver::cleanup`]; callers hold a
//! [`ResolverScope`] so that happens on every exit path.

use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use semver::Version;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, error};

/// File holding the product version at the root of a repository.
pub const VERSION_FILE: &str = "VERSION.txt";

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("git {command} failed for {repo}: {stderr}")]
    Git {
        repo: String,
        command: &'static str,
        stderr: String,
    },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid version '{version}': {reason}")]
    Parse { version: String, reason: String },

    #[error("no version known for {repo}@{revision}")]
    Unknown { repo: String, revision: String },
}

/// Parse a semantic version leniently.
///
/// Accepts surrounding whitespace, a leading `v`, missing minor/patch
/// components and leading zeros, e.g. `v1.2`, ` 01.2.03 `, `1.0.0-rc.1+b5`.
pub fn parse_tolerant(raw: &str) -> Result<Version, VersionError> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split = stripped.find(['-', '+']).unwrap_or(stripped.len());
    let (core, suffix) = stripped.split_at(split);

    let mut parts: Vec<String> = core
        .split('.')
        .map(|p| {
            let digits = p.trim_start_matches('0');
            if digits.is_empty() && !p.is_empty() {
                "0".to_string()
            } else {
                digits.to_string()
            }
        })
        .collect();
    if parts.len() > 3 {
        return Err(VersionError::Parse {
            version: raw.to_string(),
            reason: "more than three version components".to_string(),
        });
    }
    while parts.len() < 3 {
        parts.push("0".to_string());
    }

    let normalized = format!("{}{}", parts.join("."), suffix);
    Version::parse(&normalized).map_err(|e| VersionError::Parse {
        version: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Resolves the product version a repository declared at a revision.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    async fn resolve_version(&self, repo_url: &str, revision: &str)
        -> Result<Version, VersionError>;

    /// Release scratch resources acquired by earlier resolutions.
    fn cleanup(&self);
}

/// Calls [`VersionResolver::cleanup`] exactly once when dropped.
pub struct ResolverScope<'a> {
    resolver: &'a dyn VersionResolver,
}

impl<'a> ResolverScope<'a> {
    pub fn new(resolver: &'a dyn VersionResolver) -> Self {
        Self { resolver }
    }
}

impl<'a> Deref for ResolverScope<'a> {
    type Target = dyn VersionResolver + 'a;

    fn deref(&self) -> &Self::Target {
        self.resolver
    }
}

impl Drop for ResolverScope<'_> {
    fn drop(&mut self) {
        self.resolver.cleanup();
    }
}

fn normalize_repo_url(repo_url: &str) -> &str {
    repo_url.strip_suffix(".git").unwrap_or(repo_url)
}

async fn run_git(
    repo: &str,
    command: &'static str,
    args: &[&str],
    dir: Option<&Path>,
) -> Result<String, VersionError> {
    let mut cmd = Command::new("git");
    cmd.args(args).kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(VersionError::Git {
            repo: repo.to_string(),
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// [`VersionResolver`] backed by the `git` binary.
#[derive(Debug, Default)]
pub struct GitVersionResolver {
    clones: Mutex<HashMap<String, TempDir>>,
}

impl GitVersionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn cached_clone(&self, repo: &str) -> Option<PathBuf> {
        self.clones
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(repo)
            .map(|dir| dir.path().to_path_buf())
    }

    async fn checkout(&self, repo_url: &str) -> Result<PathBuf, VersionError> {
        let repo = normalize_repo_url(repo_url);
        if let Some(path) = self.cached_clone(repo) {
            return Ok(path);
        }

        let dir = tempfile::Builder::new().prefix("relcut-git-").tempdir()?;
        debug!(repo = %repo_url, dir = %dir.path().display(), "cloning repository");
        let target = dir.path().to_string_lossy().into_owned();
        run_git(
            repo_url,
            "clone",
            &["clone", "--quiet", "--no-checkout", repo_url, &target],
            None,
        )
        .await?;

        let path = dir.path().to_path_buf();
        self.clones
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(repo.to_string(), dir);
        Ok(path)
    }
}

#[async_trait]
impl VersionResolver for GitVersionResolver {
    async fn resolve_version(
        &self,
        repo_url: &str,
        revision: &str,
    ) -> Result<Version, VersionError> {
        let dir = self.checkout(repo_url).await?;
        let spec = format!("{revision}:{VERSION_FILE}");
        let content = run_git(repo_url, "show", &["show", &spec], Some(&dir)).await?;
        parse_tolerant(&content)
    }

    fn cleanup(&self) {
        let clones: Vec<(String, TempDir)> = self
            .clones
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();
        for (repo, dir) in clones {
            debug!(repo = %repo, dir = %dir.path().display(), "removing git clone");
            if let Err(e) = dir.close() {
                error!(repo = %repo, error = %e, "failed to remove git clone");
            }
        }
    }
}
