//! In-memory fakes for the image and version collaborators (testing only).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use semver::Version;

use crate::image::{ImageError, ImageInspector, ImageLabels};
use crate::version::{parse_tolerant, VersionError, VersionResolver};

/// Serves labels registered per image reference and records every lookup.
#[derive(Debug, Default)]
pub struct StaticImageInspector {
    images: Mutex<HashMap<String, ImageLabels>>,
    calls: Mutex<Vec<String>>,
}

impl StaticImageInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K, V>(&self, reference: &str, labels: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let labels = labels
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.images
            .lock()
            .unwrap()
            .insert(reference.to_string(), labels);
    }

    /// References inspected so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageInspector for StaticImageInspector {
    async fn inspect(&self, reference: &str) -> Result<ImageLabels, ImageError> {
        self.calls.lock().unwrap().push(reference.to_string());
        self.images
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))
    }
}

/// Serves versions registered per (repository, revision) and counts cleanups.
#[derive(Debug, Default)]
pub struct StaticVersionResolver {
    versions: Mutex<HashMap<(String, String), Version>>,
    cleanups: AtomicUsize,
}

impl StaticVersionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, repo_url: &str, revision: &str, version: &str) {
        let version = parse_tolerant(version).unwrap();
        self.versions
            .lock()
            .unwrap()
            .insert((repo_url.to_string(), revision.to_string()), version);
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionResolver for StaticVersionResolver {
    async fn resolve_version(
        &self,
        repo_url: &str,
        revision: &str,
    ) -> Result<Version, VersionError> {
        self.versions
            .lock()
            .unwrap()
            .get(&(repo_url.to_string(), revision.to_string()))
            .cloned()
            .ok_or_else(|| VersionError::Unknown {
                repo: repo_url.to_string(),
                revision: revision.to_string(),
            })
    }

    fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::ResolverScope;

    #[tokio::test]
    async fn inspector_records_calls_and_reports_unknown_images() {
        let images = StaticImageInspector::new();
        images.insert("quay.io/a@sha256:1", [("version", "1.0.0")]);

        assert_eq!(
            images.inspect("quay.io/a@sha256:1").await.unwrap()["version"],
            "1.0.0"
        );
        assert!(matches!(
            images.inspect("quay.io/b@sha256:2").await,
            Err(ImageError::NotFound(_))
        ));
        assert_eq!(images.calls().len(), 2);
    }

    #[tokio::test]
    async fn scope_cleans_up_once_even_on_error() {
        let resolver = StaticVersionResolver::new();
        {
            let scope = ResolverScope::new(&resolver);
            assert!(scope.resolve_version("https://git.example/x", "abc").await.is_err());
        }
        assert_eq!(resolver.cleanup_count(), 1);
    }
}
