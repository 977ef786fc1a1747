use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::config::EngineConfig;

/// Loads an [`EngineConfig`] from a static YAML file. Missing keys fall back
/// to the calibrated defaults; threshold values are validated before the
/// config is returned.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: EngineConfig = match serde_yaml::from_str(&config_content) {
        Ok(config) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            config
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, config_path = ?path_ref, "Config validation failed");
        return Err(anyhow::anyhow!("Config validation failed: {e}"));
    }

    config.trace_loaded();
    Ok(config)
}
