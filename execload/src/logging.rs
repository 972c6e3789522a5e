use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Installs the global subscriber on stderr. `RUST_LOG` wins over the `info` default.
pub(crate) fn init(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let res = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };
    if let Err(err) = res {
        eprintln!("failed to install log subscriber: {err}");
    }
}
