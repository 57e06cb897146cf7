//! Splits broker log output by severity: the connection-lifecycle and
//! traffic lines (emitted at `info` by `relay::Room`) go to standard
//! output verbatim, with no timestamp or target prefix; anything noisier
//! (`warn`/`error`, mostly transport diagnostics from `relay-network`)
//! goes to standard error. One `tracing_subscriber::fmt::layer` per
//! destination, each with its own filter, rather than one layer and a
//! branching `Display` impl.

use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber. Safe to call once per
/// process; a second call would panic (matching
/// `tracing_subscriber::registry().init()`'s own behaviour), so callers
/// must only invoke this from `main`.
pub fn init() {
    let stdout_layer = fmt::layer()
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_writer(std::io::stdout)
        .with_filter(tracing_subscriber::filter::filter_fn(|meta| *meta.level() == Level::INFO));

    let stderr_layer = fmt::layer()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry().with(stdout_layer).with(stderr_layer).init();
}
