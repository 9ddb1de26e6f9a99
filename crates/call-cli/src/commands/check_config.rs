//! Check-config command - validate a TOML configuration

use anyhow::{Context, Result};
use std::path::Path;
use telcall_core::CallManagerConfig;
use tracing::info;

pub fn execute(path: &Path) -> Result<()> {
    let config = CallManagerConfig::load(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    info!("Configuration {} is valid", path.display());

    let effective = toml::to_string_pretty(&config).context("failed to render configuration")?;
    println!("{}", effective);
    Ok(())
}
