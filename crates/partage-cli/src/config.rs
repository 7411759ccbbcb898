//! CLI configuration: where local data and the simulated relay directory
//! live. Falls back to defaults when no config file is present, the way
//! the persistence-facade config loader does.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub relay_dir: PathBuf,
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        let home = default_home();
        Self { data_dir: home.join("data"), relay_dir: home.join("relay"), log_level: "info".into() }
    }
}

fn default_home() -> PathBuf {
    std::env::var("PARTAGE_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".partage")))
        .unwrap_or_else(|_| PathBuf::from(".partage"))
}

impl CliConfig {
    pub fn load(path: &PathBuf) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "config file unreadable, using defaults");
                Self::default()
            }),
            Err(_) => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).expect("CliConfig always serializes");
        std::fs::write(path, contents)
    }

    pub fn default_config_path() -> PathBuf {
        default_home().join("config.json")
    }
}
