//! Tracing subscriber setup shared by the server and the CLI client

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Default filter directive when `RUST_LOG` is unset
pub fn default_directive(level: &str) -> String {
    format!("peerlink={},tower_http=info", level)
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `LOG_LEVEL`. When `to_stderr` is set the
/// output goes to stderr so stdout stays free for program output.
/// Subsequent calls are no-ops.
pub fn init(config: &LogConfig, to_stderr: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));

    let json = config.format.eq_ignore_ascii_case("json");
    let writer = || {
        if to_stderr {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::stdout)
        }
    };

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer())
    });
    let pretty_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(writer())
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init();
}
