use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber; `--log-filter` wins over `RUST_LOG`.
pub(crate) fn init_tracing(log_filter: Option<&str>) {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into());
    let env_filter = match log_filter {
        Some(directives) => builder.parse_lossy(directives),
        None => builder.from_env_lossy(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
