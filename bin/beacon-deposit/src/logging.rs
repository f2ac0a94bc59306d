//! Logging initialization.

use std::io;

use tracing_subscriber::{
    fmt::layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Initializes logging to stderr, leaving stdout for signed transactions.
///
/// Defaults to INFO, overridable through `RUST_LOG`.
pub(crate) fn init(json: bool) {
    let filt = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    let stderr_sub = if json {
        layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(filt)
            .boxed()
    } else {
        layer()
            .compact()
            .with_writer(io::stderr)
            .with_filter(filt)
            .boxed()
    };

    tracing_subscriber::registry().with(stderr_sub).init();
}
