//! Shared setup for the `uplog` binary.

use std::path::Path;

use anyhow::Context;
use uplog_core::Config;

/// Initialize tracing for CLI binaries.
///
/// Logs go to stderr; stdout is reserved for the uploaded URL.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Write the default configuration to `path`, replacing any existing file.
pub fn write_default_config(path: &Path) -> anyhow::Result<()> {
    Config::default()
        .save(path)
        .with_context(|| format!("could not initialize config at {}", path.display()))
}

/// Load the config at `path` and get it ready for a run.
///
/// The file is rewritten after loading so keys added in newer versions show
/// up in it; a failed rewrite is only logged. Environment overrides are
/// applied after the rewrite and never persisted.
pub fn prepare_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(path).context("could not load config")?;

    if let Err(e) = config.save(path) {
        tracing::warn!(error = %e, config_path = %path.display(), "Unable to update config");
    }

    config.apply_env_overrides();
    config.validate().context("invalid config")?;
    Ok(config)
}
