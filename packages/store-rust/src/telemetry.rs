//! Tracing subscriber setup for host binaries embedding the wrapper.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Returns `false`
/// if a global subscriber was already installed, in which case nothing
/// changes.
pub fn init_tracing(format: TracingFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        TracingFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        TracingFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    installed.is_ok()
}
