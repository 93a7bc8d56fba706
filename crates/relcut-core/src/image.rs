//! Container image label inspection.
//!
//! Candidate validation only needs the flat label map baked into an image's
//! config blob. [`RegistryInspector`] fetches it straight from the registry
//! (manifest + config, no layers) using `oci-distribution`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::manifest::ImageIndexEntry;
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};
use serde::Deserialize;
use tracing::debug;

/// Image label carrying the product version.
pub const VERSION_LABEL: &str = "version";

/// Flat key -> value labels of an image.
pub type ImageLabels = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid image reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    #[error("failed to pull metadata for {reference}: {message}")]
    Registry { reference: String, message: String },

    #[error("malformed image config for {reference}: {message}")]
    MalformedConfig { reference: String, message: String },

    #[error("no image data for {0}")]
    NotFound(String),
}

/// Returns the label map of a content-addressed image reference.
#[async_trait]
pub trait ImageInspector: Send + Sync {
    async fn inspect(&self, reference: &str) -> Result<ImageLabels, ImageError>;
}

/// Portion of an image reference from the last `@sha256:` onward.
pub fn digest_suffix(reference: &str) -> Option<&str> {
    reference.rfind("@sha256:").map(|idx| &reference[idx..])
}

/// Whether two references point at the same content, regardless of registry
/// or repository path. References without a digest never match.
pub fn same_digest(a: &str, b: &str) -> bool {
    matches!((digest_suffix(a), digest_suffix(b)), (Some(x), Some(y)) if x == y)
}

/// Registry credentials.
#[derive(Debug, Clone, Default)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`, falling back to
    /// anonymous access when either is missing.
    pub fn from_env() -> Self {
        match (
            std::env::var("REGISTRY_USERNAME").ok(),
            std::env::var("REGISTRY_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Self::basic(username, password),
            _ => Self::anonymous(),
        }
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    config: Option<ContainerConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Labels", default)]
    labels: Option<ImageLabels>,
}

fn labels_from_config(reference: &str, raw: &str) -> Result<ImageLabels, ImageError> {
    let file: ConfigFile =
        serde_json::from_str(raw).map_err(|e| ImageError::MalformedConfig {
            reference: reference.to_string(),
            message: e.to_string(),
        })?;
    Ok(file.config.and_then(|c| c.labels).unwrap_or_default())
}

/// Picks the linux/amd64 entry of a multi-arch index; release bundles are
/// published for it even when other architectures are missing.
fn linux_amd64_resolver(manifests: &[ImageIndexEntry]) -> Option<String> {
    manifests
        .iter()
        .find(|entry| {
            entry
                .platform
                .as_ref()
                .is_some_and(|p| p.os == "linux" && p.architecture == "amd64")
        })
        .or_else(|| manifests.first())
        .map(|entry| entry.digest.clone())
}

/// [`ImageInspector`] that reads labels from a remote registry.
pub struct RegistryInspector {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryInspector {
    pub fn new(auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            platform_resolver: Some(Box::new(linux_amd64_resolver)),
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            auth,
        }
    }

    pub fn from_env() -> Self {
        Self::new(RegistryAuth::from_env())
    }
}

#[async_trait]
impl ImageInspector for RegistryInspector {
    #[tracing::instrument(skip(self))]
    async fn inspect(&self, reference: &str) -> Result<ImageLabels, ImageError> {
        let oci_ref = reference
            .parse::<Reference>()
            .map_err(|e| ImageError::InvalidReference {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        let (_manifest, digest, config) = self
            .client
            .pull_manifest_and_config(&oci_ref, &self.auth.to_oci_auth())
            .await
            .map_err(|e| ImageError::Registry {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        let labels = labels_from_config(reference, &config)?;
        debug!(digest = %digest, labels = labels.len(), "fetched image labels");
        Ok(labels)
    }
}
