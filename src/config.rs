use std::path::Path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Engine-wide tuning, loadable from YAML. Missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A skip may dispatch at most `nodes * skip_hop_factor` nodes before the graph is killed.
    pub skip_hop_factor: usize,
    /// Ticks per second used by the CLI driver.
    pub tick_rate: u32,
    /// Cross-graph commands applied per flush before the rest are dropped.
    pub max_commands_per_flush: usize,
    /// Default for graphs that leave `unfreeze_pause_menus` unset.
    pub unfreeze_pause_menus: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_hop_factor: 3,
            tick_rate: 60,
            max_commands_per_flush: 1024,
            unfreeze_pause_menus: false,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}
