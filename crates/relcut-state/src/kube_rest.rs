//! Record store backed by a Kubernetes-style API server
//!
//! Speaks the plain REST protocol: collection `GET` with `labelSelector`,
//! item `GET`, `POST` with optional `dryRun=All`, and streaming
//! `?watch=true` responses (newline-delimited JSON events).

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::error::StorageError;
use crate::schema::*;
use crate::storage_traits::*;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for the API server
#[derive(Debug, Clone)]
pub struct KubeRestConfig {
    /// API server base URL (e.g., "https://api.cluster.example:6443")
    pub server: String,
    /// Bearer token (optional for anonymous access)
    pub token: Option<String>,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
}

impl KubeRestConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            token: None,
            accept_invalid_certs: false,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - RELCUT_SERVER (falls back to the in-cluster service address)
    /// - RELCUT_TOKEN (falls back to the mounted service account token)
    /// - RELCUT_INSECURE (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, StorageError> {
        let server = match std::env::var("RELCUT_SERVER") {
            Ok(server) => server,
            Err(_) => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
                    StorageError::Config(
                        "RELCUT_SERVER not set and not running in a cluster".to_string(),
                    )
                })?;
                let port =
                    std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
                format!("https://{host}:{port}")
            }
        };
        let token = std::env::var("RELCUT_TOKEN")
            .ok()
            .or_else(|| read_service_account_file("token"));
        let accept_invalid_certs = std::env::var("RELCUT_INSECURE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            server,
            token,
            accept_invalid_certs,
        })
    }
}

fn read_service_account_file(file: &str) -> Option<String> {
    std::fs::read_to_string(Path::new(SERVICE_ACCOUNT_DIR).join(file))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Namespace of the running pod, when inside a cluster.
pub fn in_cluster_namespace() -> Option<String> {
    read_service_account_file("namespace")
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// `RecordStore` over HTTP
pub struct KubeRestStore {
    config: KubeRestConfig,
    http_client: reqwest::Client,
}

impl KubeRestStore {
    pub fn new(config: KubeRestConfig) -> Result<Self, StorageError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("relcut/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| StorageError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(KubeRestStore {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self, StorageError> {
        Self::new(KubeRestConfig::from_env()?)
    }

    fn collection_url<T: Resource>(&self, namespace: &str) -> String {
        format!(
            "{}/apis/{}/namespaces/{}/{}",
            self.config.server.trim_end_matches('/'),
            API_VERSION,
            namespace,
            T::PLURAL
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check<T: Resource>(
        response: Response,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiStatus>()
            .await
            .map(|s| s.message)
            .unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => StorageError::NotFound {
                kind: T::KIND,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            StatusCode::CONFLICT => StorageError::AlreadyExists {
                kind: T::KIND,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            _ => StorageError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    #[instrument(skip(self), fields(kind = T::KIND))]
    async fn list<T: Resource>(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<T>> {
        let mut request = self.request(Method::GET, &self.collection_url::<T>(namespace));
        if !selector.is_empty() {
            request = request.query(&[("labelSelector", selector.to_query())]);
        }
        let response = Self::check::<T>(request.send().await?, namespace, "").await?;
        let envelope: ListEnvelope<T> = response.json().await?;
        debug!(count = envelope.items.len(), "listed records");
        Ok(envelope.items)
    }

    #[instrument(skip(self), fields(kind = T::KIND))]
    async fn get<T: Resource>(&self, namespace: &str, name: &str) -> StorageResult<T> {
        let url = format!("{}/{}", self.collection_url::<T>(namespace), name);
        let response = Self::check::<T>(
            self.request(Method::GET, &url).send().await?,
            namespace,
            name,
        )
        .await?;
        Ok(response.json().await?)
    }

    async fn create<T: Resource>(&self, record: &T, dry_run: bool) -> StorageResult<T> {
        let namespace = &record.metadata().namespace;
        let mut body = serde_json::to_value(record)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("apiVersion".to_string(), API_VERSION.into());
            obj.insert("kind".to_string(), T::KIND.into());
            obj.remove("status");
        }
        let mut request = self
            .request(Method::POST, &self.collection_url::<T>(namespace))
            .json(&body);
        if dry_run {
            request = request.query(&[("dryRun", "All")]);
        }
        let response =
            Self::check::<T>(request.send().await?, namespace, record.name()).await?;
        Ok(response.json().await?)
    }
}

/// Split complete lines off `buffer`, decoding each as a watch event.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<StorageResult<WatchEvent>> {
    let mut events = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        events.push(serde_json::from_slice::<WatchEvent>(line).map_err(StorageError::from));
    }
    events
}

#[async_trait]
impl RecordStore for KubeRestStore {
    async fn list_applications(&self, namespace: &str) -> StorageResult<Vec<Application>> {
        self.list(namespace, &LabelSelector::new()).await
    }

    async fn get_application(&self, namespace: &str, name: &str) -> StorageResult<Application> {
        self.get(namespace, name).await
    }

    async fn list_components(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Component>> {
        self.list(namespace, selector).await
    }

    async fn get_component(&self, namespace: &str, name: &str) -> StorageResult<Component> {
        self.get(namespace, name).await
    }

    async fn list_snapshots(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Snapshot>> {
        self.list(namespace, selector).await
    }

    async fn get_snapshot(&self, namespace: &str, name: &str) -> StorageResult<Snapshot> {
        self.get(namespace, name).await
    }

    async fn list_releases(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<Release>> {
        self.list(namespace, selector).await
    }

    async fn get_release(&self, namespace: &str, name: &str) -> StorageResult<Release> {
        self.get(namespace, name).await
    }

    async fn create_release(&self, release: &Release, dry_run: bool) -> StorageResult<Release> {
        self.create(release, dry_run).await
    }

    async fn list_release_plans(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StorageResult<Vec<ReleasePlan>> {
        self.list(namespace, selector).await
    }

    #[instrument(skip(self))]
    async fn watch_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> StorageResult<WatchSubscription<Release>> {
        let request = self
            .request(Method::GET, &self.collection_url::<Release>(namespace))
            .query(&[
                ("watch", "true".to_string()),
                ("fieldSelector", format!("metadata.name={name}")),
            ]);
        let response = Self::check::<Release>(request.send().await?, namespace, name).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let release = name.to_string();
        let producer = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = Vec::new();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        for event in drain_lines(&mut buffer) {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(release = %release, error = %e, "watch stream failed");
                        let _ = tx.send(Err(StorageError::from(e)));
                        return;
                    }
                }
            }
            debug!(release = %release, "watch stream ended");
        });

        Ok(WatchSubscription::new(rx, Some(producer)))
    }
}
