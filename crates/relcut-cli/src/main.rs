//! relcut - snapshot candidate selection and release tracking CLI
//!
//! ## Commands
//!
//! - `release create`: Pick the next releasable snapshot, create its release
//!   and wait for the release pipeline
//! - `waitfor release`: Wait for an existing release to finish
//! - `get`: List snapshots, releases, applications, components and release
//!   plans

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use relcut_core::classifier::list_application_components;
use relcut_core::snapshots::sort_newest_first;
use relcut_core::{
    await_completion, create_release, generate_release_manifest, list_release_plans,
    list_releases, list_snapshots, load_release_notes, release_and_wait, release_status,
    ApplicationContext, CandidateSelector, Collaborators, Completion, Environment,
    GitVersionResolver, RegistryInspector, ReleaseConfig,
};
use relcut_state::kube_rest::in_cluster_namespace;
use relcut_state::labels::*;
use relcut_state::{
    Application, Component, KubeRestConfig, KubeRestStore, LabelSelector, ObjectMeta,
    RecordStore, Release, ReleasePlan, Snapshot,
};
use serde::Serialize;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "relcut")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Snapshot candidate selection and release tracking", long_about = None)]
struct Cli {
    /// Namespace holding the application (default: the pod's namespace)
    #[arg(short, long, global = true, env = "RELCUT_NAMESPACE")]
    namespace: Option<String>,

    /// API server URL (default: the in-cluster service address)
    #[arg(long, global = true, env = "RELCUT_SERVER")]
    server: Option<String>,

    /// Bearer token for the API server
    #[arg(long, global = true, env = "RELCUT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Output format for records printed on stdout
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Release operations
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// Wait for a record to reach a terminal state
    Waitfor {
        #[command(subcommand)]
        target: WaitTarget,
    },

    /// List or show records
    Get {
        #[command(subcommand)]
        resource: GetResource,
    },
}

#[derive(Subcommand)]
enum ReleaseAction {
    /// Select a snapshot and create a release for it
    Create {
        /// Application to release
        #[arg(short, long)]
        app: String,

        /// Target environment (staging or production)
        #[arg(short, long, default_value_t = Environment::Staging)]
        env: Environment,

        /// Release this snapshot instead of selecting one
        #[arg(long)]
        snapshot: Option<String>,

        /// Release the snapshot built from this commit
        #[arg(long)]
        sha: Option<String>,

        /// Only consider snapshots built from this source version
        #[arg(long)]
        version: Option<String>,

        /// Re-release the last released snapshot when nothing newer is valid
        #[arg(long)]
        force: bool,

        /// Validate the release server-side without persisting it
        #[arg(long)]
        dry_run: bool,

        /// Wait for the release pipeline to finish (default)
        #[arg(long, overrides_with = "no_wait")]
        wait: bool,

        /// Return as soon as the release is created
        #[arg(long, overrides_with = "wait")]
        no_wait: bool,

        /// Minutes to wait for the release pipeline
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// YAML file with release notes (type, issues, cves, reference)
        #[arg(long)]
        release_notes: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum WaitTarget {
    /// Wait for a release to succeed or fail
    Release {
        /// Release name
        name: String,

        /// Minutes to wait
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
}

#[derive(Subcommand)]
enum GetResource {
    /// Snapshots, newest first
    Snapshot {
        /// Restrict to push snapshots of this application's release component
        #[arg(short, long)]
        app: Option<String>,

        /// Show only the snapshot a release would pick
        #[arg(long, requires = "app", conflicts_with = "name")]
        candidate: bool,

        /// Only snapshots built from this source version
        #[arg(long, requires = "app")]
        version: Option<String>,

        /// Snapshot name
        name: Option<String>,
    },

    /// Releases, newest first
    Release {
        #[arg(short, long)]
        app: Option<String>,

        /// Release name
        name: Option<String>,
    },

    /// Applications
    Application {
        /// Application name
        name: Option<String>,
    },

    /// Components
    Component {
        #[arg(short, long)]
        app: Option<String>,
    },

    /// Release plans
    Releaseplan {
        #[arg(short, long)]
        app: Option<String>,

        #[arg(short, long)]
        env: Option<Environment>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    relcut_core::init_tracing(cli.json, level);

    let namespace = cli
        .namespace
        .clone()
        .or_else(in_cluster_namespace)
        .context("No namespace given; pass --namespace or set RELCUT_NAMESPACE")?;
    let store = connect(&cli)?;
    let images = RegistryInspector::from_env();
    let versions = GitVersionResolver::new();
    let deps = Collaborators {
        store: &store,
        images: &images,
        versions: &versions,
    };

    let out = run(cli.command, deps, &namespace, cli.output).await?;
    if !out.is_empty() {
        println!("{out}");
    }
    Ok(())
}

fn connect(cli: &Cli) -> Result<KubeRestStore> {
    let mut config = match &cli.server {
        Some(server) => KubeRestConfig::new(server.clone()),
        None => KubeRestConfig::from_env()
            .context("No API server configured; pass --server or set RELCUT_SERVER")?,
    };
    if let Some(token) = &cli.token {
        config = config.with_token(token.clone());
    }
    if cli.insecure {
        config = config.with_accept_invalid_certs(true);
    }
    KubeRestStore::new(config).context("Failed to create API client")
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

async fn run(
    command: Commands,
    deps: Collaborators<'_>,
    namespace: &str,
    output: OutputFormat,
) -> Result<String> {
    match command {
        Commands::Release { action } => match action {
            ReleaseAction::Create {
                app,
                env,
                snapshot,
                sha,
                version,
                force,
                dry_run,
                wait: _,
                no_wait,
                timeout,
                release_notes,
            } => {
                let mut config = ReleaseConfig::new(namespace, app)
                    .with_environment(env)
                    .with_force_release(force)
                    .with_dry_run(dry_run)
                    .with_timeout(minutes(timeout));
                if let Some(snapshot) = snapshot {
                    config = config.with_snapshot(snapshot);
                }
                if let Some(sha) = sha {
                    config = config.with_sha(sha);
                }
                if let Some(version) = version {
                    config = config.with_version(version);
                }
                if let Some(path) = release_notes {
                    let notes = load_release_notes(&path).with_context(|| {
                        format!("Failed to read release notes from {}", path.display())
                    })?;
                    config = config.with_release_notes(notes);
                }
                cmd_release_create(deps, &config, !no_wait, output).await
            }
        },
        Commands::Waitfor { target } => match target {
            WaitTarget::Release { name, timeout } => {
                cmd_waitfor_release(deps.store, namespace, &name, minutes(timeout)).await
            }
        },
        Commands::Get { resource } => match resource {
            GetResource::Snapshot {
                app,
                candidate,
                version,
                name,
            } => {
                cmd_get_snapshot(
                    deps,
                    namespace,
                    app.as_deref(),
                    candidate,
                    version.as_deref(),
                    name.as_deref(),
                    output,
                )
                .await
            }
            GetResource::Release { app, name } => {
                cmd_get_release(deps.store, namespace, app.as_deref(), name.as_deref(), output)
                    .await
            }
            GetResource::Application { name } => {
                cmd_get_application(deps.store, namespace, name.as_deref(), output).await
            }
            GetResource::Component { app } => {
                cmd_get_component(deps.store, namespace, app.as_deref(), output).await
            }
            GetResource::Releaseplan { app, env } => {
                let plans = list_release_plans(deps.store, namespace, app.as_deref(), env)
                    .await
                    .context("Failed to list release plans")?;
                render(output, &plans)
            }
        },
    }
}

// ===========================================================================
// Release commands
// ===========================================================================

async fn cmd_release_create(
    deps: Collaborators<'_>,
    config: &ReleaseConfig,
    wait: bool,
    output: OutputFormat,
) -> Result<String> {
    if !wait || config.dry_run {
        let manifest = generate_release_manifest(deps, config)
            .await
            .with_context(|| {
                format!("Failed to generate a release for {}", config.application)
            })?;
        let created = create_release(deps.store, &manifest, config.dry_run)
            .await
            .context("Failed to create release")?;
        return describe_created(&created, config.dry_run, output);
    }

    let (created, completion) = release_and_wait(deps, config)
        .await
        .with_context(|| format!("Release of {} did not succeed", config.application))?;
    let mut out = describe_created(&created, false, output)?;
    if let Some(completion) = completion {
        out.push('\n');
        out.push_str(&describe_completion(&completion));
    }
    Ok(out)
}

async fn cmd_waitfor_release(
    store: &dyn RecordStore,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<String> {
    let release = store
        .get_release(namespace, name)
        .await
        .with_context(|| format!("Failed to get release {namespace}/{name}"))?;
    let completion = await_completion(store, &release, timeout)
        .await
        .with_context(|| format!("Release {name} did not succeed"))?;
    Ok(describe_completion(&completion))
}

fn describe_created(release: &Release, dry_run: bool, output: OutputFormat) -> Result<String> {
    if output == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(release)?);
    }
    let suffix = if dry_run { " (dry run)" } else { "" };
    Ok(format!(
        "release/{} created for snapshot {}{suffix}",
        release.metadata.name, release.spec.snapshot
    ))
}

/// A timeout is reported, not failed: the pipeline may still finish.
fn describe_completion(completion: &Completion) -> String {
    match completion {
        Completion::Succeeded { release, .. } => {
            info!(release = %release, "release succeeded");
            format!("release/{release} succeeded")
        }
        Completion::TimedOut { release, waited } => {
            warn!(
                release = %release,
                waited_secs = waited.as_secs(),
                "stopped waiting for release; it may still complete"
            );
            format!(
                "release/{release} still running after {} minutes",
                waited.as_secs() / 60
            )
        }
    }
}

// ===========================================================================
// Get commands
// ===========================================================================

async fn cmd_get_snapshot(
    deps: Collaborators<'_>,
    namespace: &str,
    app: Option<&str>,
    candidate: bool,
    version: Option<&str>,
    name: Option<&str>,
    output: OutputFormat,
) -> Result<String> {
    let snapshots = match (name, app) {
        (Some(name), _) => vec![deps
            .store
            .get_snapshot(namespace, name)
            .await
            .with_context(|| format!("Failed to get snapshot {namespace}/{name}"))?],
        (None, Some(app)) => {
            let context = ApplicationContext::load(deps.store, namespace, app)
                .await
                .with_context(|| format!("Failed to load application {namespace}/{app}"))?;
            let snapshots = list_snapshots(deps, &context, version).await?;
            if candidate {
                let selector = CandidateSelector::new(deps.store, deps.images, &context);
                vec![selector.select_from(snapshots, false).await?]
            } else {
                snapshots
            }
        }
        (None, None) => {
            let mut all = deps
                .store
                .list_snapshots(namespace, &LabelSelector::new())
                .await
                .context("Failed to list snapshots")?;
            sort_newest_first(&mut all);
            all
        }
    };
    render(output, &snapshots)
}

async fn cmd_get_release(
    store: &dyn RecordStore,
    namespace: &str,
    app: Option<&str>,
    name: Option<&str>,
    output: OutputFormat,
) -> Result<String> {
    let releases = match name {
        Some(name) => vec![store
            .get_release(namespace, name)
            .await
            .with_context(|| format!("Failed to get release {namespace}/{name}"))?],
        None => list_releases(store, namespace, app)
            .await
            .context("Failed to list releases")?,
    };
    render(output, &releases)
}

async fn cmd_get_application(
    store: &dyn RecordStore,
    namespace: &str,
    name: Option<&str>,
    output: OutputFormat,
) -> Result<String> {
    let applications = match name {
        Some(name) => vec![store
            .get_application(namespace, name)
            .await
            .with_context(|| format!("Failed to get application {namespace}/{name}"))?],
        None => store
            .list_applications(namespace)
            .await
            .context("Failed to list applications")?,
    };
    render(output, &applications)
}

async fn cmd_get_component(
    store: &dyn RecordStore,
    namespace: &str,
    app: Option<&str>,
    output: OutputFormat,
) -> Result<String> {
    let components = match app {
        Some(app) => list_application_components(store, namespace, app).await?,
        None => store
            .list_components(namespace, &LabelSelector::new())
            .await
            .context("Failed to list components")?,
    };
    render(output, &components)
}

// ===========================================================================
// Rendering
// ===========================================================================

/// A record kind printable as one tab-separated table row.
trait Listing: Serialize {
    const HEADER: &'static [&'static str];

    fn row(&self) -> Vec<String>;
}

fn label_or_dash(meta: &ObjectMeta, key: &str) -> String {
    meta.label(key).unwrap_or("-").to_string()
}

fn created_at(meta: &ObjectMeta) -> String {
    meta.creation_timestamp
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}

impl Listing for Snapshot {
    const HEADER: &'static [&'static str] =
        &["NAME", "APPLICATION", "COMPONENT", "SHA", "TITLE", "TESTS", "CREATED"];

    fn row(&self) -> Vec<String> {
        vec![
            self.metadata.name.clone(),
            self.spec.application.clone(),
            label_or_dash(&self.metadata, COMPONENT_LABEL),
            label_or_dash(&self.metadata, SHA_LABEL),
            self.metadata
                .annotation(SHA_TITLE_ANNOTATION)
                .unwrap_or("-")
                .to_string(),
            self.test_status().unwrap_or("-").to_string(),
            created_at(&self.metadata),
        ]
    }
}

impl Listing for Release {
    const HEADER: &'static [&'static str] =
        &["NAME", "SNAPSHOT", "RELEASEPLAN", "STATUS", "CREATED"];

    fn row(&self) -> Vec<String> {
        vec![
            self.metadata.name.clone(),
            self.spec.snapshot.clone(),
            self.spec.release_plan.clone(),
            release_status(self).to_string(),
            created_at(&self.metadata),
        ]
    }
}

impl Listing for Application {
    const HEADER: &'static [&'static str] = &["NAME", "TYPE"];

    fn row(&self) -> Vec<String> {
        vec![
            self.metadata.name.clone(),
            label_or_dash(&self.metadata, APPLICATION_TYPE_LABEL),
        ]
    }
}

impl Listing for Component {
    const HEADER: &'static [&'static str] = &["NAME", "APPLICATION", "TYPE", "BUNDLE-LABEL"];

    fn row(&self) -> Vec<String> {
        vec![
            self.metadata.name.clone(),
            self.spec.application.clone(),
            label_or_dash(&self.metadata, COMPONENT_TYPE_LABEL),
            label_or_dash(&self.metadata, BUNDLE_REFERENCE_LABEL),
        ]
    }
}

impl Listing for ReleasePlan {
    const HEADER: &'static [&'static str] = &["NAME", "APPLICATION", "ENVIRONMENT", "TARGET"];

    fn row(&self) -> Vec<String> {
        vec![
            self.metadata.name.clone(),
            self.spec.application.clone(),
            label_or_dash(&self.metadata, ENVIRONMENT_LABEL),
            self.spec.target.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

fn render<T: Listing>(output: OutputFormat, records: &[T]) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Table => {
            let mut out = T::HEADER.join("\t");
            for record in records {
                out.push('\n');
                out.push_str(&record.row().join("\t"));
            }
            Ok(out)
        }
    }
}
