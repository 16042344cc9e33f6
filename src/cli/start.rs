use crate::{
    cli::{
        actions::Action,
        commands,
        dispatch::{handler, json_logs, verbosity},
        globals::GlobalArgs,
    },
    GIT_COMMIT_HASH,
};
use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Start the CLI
pub fn start() -> Result<(Action, GlobalArgs)> {
    let matches = commands::new().get_matches();

    let verbosity_level = match verbosity(&matches) {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // stdout carries command output
    let json = json_logs(&matches);
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
    });
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_target(false)
    });

    // RUST_LOG=
    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy();

    let subscriber = Registry::default()
        .with(text_layer)
        .with(json_layer)
        .with(env_filter);

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        commit = GIT_COMMIT_HASH,
        "Starting murmur"
    );

    handler(&matches)
}
