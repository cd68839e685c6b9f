use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "config/trackexp.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, including the `/api/` segment.
    pub base_url: String,
    /// Applied to connect and to the whole request.
    pub timeout_secs: u64,
    /// Directory holding the encrypted credential file and its key.
    pub credentials_dir: PathBuf,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api/".to_string(),
            timeout_secs: 30,
            credentials_dir: PathBuf::from("config/credentials"),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Layers, lowest priority first: defaults, the TOML file at `path`
    /// (optional, `config/trackexp.toml` when `None`), `TRACKEXP_*` env vars.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        let mut builder = config::Config::builder();
        builder = builder.add_source(config::File::with_name(config_path).required(false));
        builder = builder.add_source(config::Environment::with_prefix("TRACKEXP"));
        Ok(builder.build()?.try_deserialize()?)
    }
}
