//! `load_config` module: loads the optional YAML file with defaults for generation.
//!
//! The file only carries output layout and download tuning; credentials come
//! from the environment (see [`crate::client`]). Every field is optional and
//! command-line flags take precedence over it.
//!
//! ```yaml
//! config_dir: resources
//! source_dir: src
//! exclude_dirs: [".git", "node_modules"]
//! concurrency: 8
//! ```
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GenerateConfig {
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub exclude_dirs: Option<Vec<String>>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GenerateConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid config with nothing set.
    if config_content.trim().is_empty() {
        return Ok(GenerateConfig::default());
    }

    let config: GenerateConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if config.concurrency == Some(0) {
        error!(config_path = ?path_ref, "concurrency must be at least 1");
        anyhow::bail!("concurrency must be at least 1");
    }

    Ok(config)
}
