//! Tracing setup for `relcut`.
//!
//! stdout belongs to command output: `relcut release create --dry-run -o json`
//! and `relcut get ... -o json` are piped into `jq` or `kubectl apply -f -`,
//! so every log line, JSON or not, is written to stderr.
//!
//! Without `RUST_LOG` only the relcut crates log at the requested level;
//! HTTP and registry clients stay at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const RELCUT_TARGETS: &[&str] = &["relcut", "relcut_core", "relcut_state"];

/// Default filter directive for `level`.
pub fn default_directive(level: Level) -> String {
    let mut directive = String::from("warn");
    for target in RELCUT_TARGETS {
        directive.push_str(&format!(",{target}={}", level.as_str().to_lowercase()));
    }
    directive
}

/// Install the global subscriber. Returns false when one was already set.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    installed.is_ok()
}
