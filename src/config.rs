//! Run-settings loading for the CLI.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::EngineError;

/// Pacing and duration of a run, read from an optional `config.toml` next
/// to the scenario file. Every field has a default, so the file itself is
/// optional too.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RunConfig {
    /// Wall-clock delay between ticks in continuous-run mode (ms).
    pub tick_interval_ms: u64,
    /// Number of ticks to run before stopping.
    pub max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 800,
            max_ticks: 60,
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file; a missing file yields the
    /// defaults, a malformed one is an error.
    pub fn load_or_default(config_path: &Path) -> Result<Self, EngineError> {
        let content = match std::fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(EngineError::InvalidConfiguration(format!(
                    "failed to read config file {}: {}",
                    config_path.display(),
                    e
                )));
            }
        };
        toml::from_str(&content).map_err(|e| EngineError::InvalidConfiguration(format!("failed to parse config file: {}", e)))
    }

    /// Derive the config path from a scenario file path.
    ///
    /// Replaces the scenario filename with "config.toml" in the same
    /// directory.
    pub fn config_path_from_scenario(scenario_path: &str) -> PathBuf {
        let scenario = Path::new(scenario_path);
        scenario.parent().unwrap_or(Path::new(".")).join("config.toml")
    }
}
