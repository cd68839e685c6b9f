use crate::error::ConfigError;

/// Installs the global `tracing` subscriber at `level` for this workspace's crates.
pub fn init(level: &str) -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(format!("trackexp={level},api_types={level}"))
        .try_init()
        .map_err(|err| ConfigError::Logging(err.to_string()))
}
