use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. `RUST_LOG` directives win over the
/// verbosity flag; logs go to stderr so stdout stays machine readable.
pub fn setup_logging(verbose: u8, json: bool) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("failed to install JSON logger")
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("failed to install logger")
    }
}
