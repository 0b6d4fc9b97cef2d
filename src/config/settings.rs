use std::path::PathBuf;

use serde::Deserialize;

use crate::config::{ConfigError, Result};

pub const FORMATS: &[&str] = &["tree", "flat", "dot", "json"];
pub const DIRECTIONS: &[&str] = &["down", "up", "both"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub risk: RiskSettings,
}

impl Settings {
    /// Rejects values no command could act on. Run after env overrides.
    pub fn validate(&self) -> Result<()> {
        let format = self.output.format.to_ascii_lowercase();
        if !FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "output.format",
                value: self.output.format.clone(),
            });
        }
        let direction = self.output.direction.to_ascii_lowercase();
        if !DIRECTIONS.contains(&direction.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "output.direction",
                value: self.output.direction.clone(),
            });
        }
        if self.risk.top == 0 {
            return Err(ConfigError::InvalidValue {
                key: "risk.top",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: default_format(),
            direction: default_direction(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self { top: default_top() }
    }
}

fn default_format() -> String {
    "tree".to_string()
}

fn default_direction() -> String {
    "down".to_string()
}

fn default_color() -> bool {
    true
}

fn default_top() -> usize {
    10
}
