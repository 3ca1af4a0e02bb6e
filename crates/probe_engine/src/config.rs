//! Probe system configuration
//!
//! Serde types loadable from RON or TOML, picked by file extension. All
//! fields have defaults so partial files work; `validate` catches values
//! the runtime cannot honor before any resource is touched.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probes::scoring::{DistancePriorityScorer, PriorityScorer, ProbeScorer};
use crate::probes::{MAX_FORWARD_PROBES, MAX_PROBE_COUNT};

/// Errors from loading, saving or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("config file io failed: {0}")]
    Io(#[from] std::io::Error),

    /// File contents did not parse as the extension's format
    #[error("config parse failed: {0}")]
    Parse(String),

    /// Config could not be serialized for saving
    #[error("config serialization failed: {0}")]
    Serialize(String),

    /// The file extension maps to no supported format
    #[error("unsupported config format: .{0} (expected .ron or .toml)")]
    UnsupportedFormat(String),

    /// A value is outside the range the runtime supports
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Selectable scoring policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScorerKind {
    /// Priority attenuated by squared view distance (the default)
    #[default]
    DistancePriority,
    /// Raw designer priority, ignoring the view
    PriorityOnly,
}

impl ScorerKind {
    /// Instantiate the policy this kind names
    pub fn build(self) -> Box<dyn ProbeScorer> {
        match self {
            Self::DistancePriority => Box::new(DistancePriorityScorer),
            Self::PriorityOnly => Box::new(PriorityScorer),
        }
    }
}

/// Tunables for the probe subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSystemConfig {
    /// Upper bound on probes selected per frame, at most [`MAX_PROBE_COUNT`]
    pub max_probes: usize,
    /// Upper bound on probes bound per forward draw, at most
    /// [`MAX_FORWARD_PROBES`]
    pub max_forward_probes: usize,
    /// Edge length of captured radiance cubemaps, power of two
    pub capture_resolution: u32,
    /// Edge length of derived irradiance cubemaps, power of two
    pub irradiance_resolution: u32,
    /// Monte Carlo samples per irradiance texel
    pub irradiance_samples: u32,
    /// Near clip plane for probe captures
    pub capture_near: f32,
    /// Far clip plane for probe captures
    pub capture_far: f32,
    /// Start with probe visualization shapes enabled
    pub render_reflection_probes: bool,
    /// Scoring policy used for per-frame selection
    pub scorer: ScorerKind,
}

impl Default for ProbeSystemConfig {
    fn default() -> Self {
        Self {
            max_probes: MAX_PROBE_COUNT,
            max_forward_probes: MAX_FORWARD_PROBES,
            capture_resolution: 128,
            irradiance_resolution: 32,
            irradiance_samples: 256,
            capture_near: 0.1,
            capture_far: 1000.0,
            render_reflection_probes: false,
            scorer: ScorerKind::default(),
        }
    }
}

impl ProbeSystemConfig {
    /// Check every field against the runtime's hard limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_probes == 0 || self.max_probes > MAX_PROBE_COUNT {
            return Err(ConfigError::Invalid(format!(
                "max_probes must be in 1..={MAX_PROBE_COUNT}, got {}",
                self.max_probes
            )));
        }
        if self.max_forward_probes == 0 || self.max_forward_probes > MAX_FORWARD_PROBES {
            return Err(ConfigError::Invalid(format!(
                "max_forward_probes must be in 1..={MAX_FORWARD_PROBES}, got {}",
                self.max_forward_probes
            )));
        }
        if !self.capture_resolution.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "capture_resolution must be a power of two, got {}",
                self.capture_resolution
            )));
        }
        if !self.irradiance_resolution.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "irradiance_resolution must be a power of two, got {}",
                self.irradiance_resolution
            )));
        }
        if self.irradiance_samples == 0 {
            return Err(ConfigError::Invalid(
                "irradiance_samples must be at least 1".to_string(),
            ));
        }
        if self.capture_near <= 0.0 || self.capture_far <= self.capture_near {
            return Err(ConfigError::Invalid(format!(
                "capture clip planes are degenerate: near {} far {}",
                self.capture_near, self.capture_far
            )));
        }
        Ok(())
    }

    /// Load and validate a config, format chosen by file extension
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Self = match extension(path) {
            Some("ron") => {
                ron::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?
            }
            Some("toml") => {
                toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?
            }
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        config.validate()?;
        log::debug!("loaded probe config from {}", path.display());
        Ok(config)
    }

    /// Save the config, format chosen by file extension
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = match extension(path) {
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|err| ConfigError::Serialize(err.to_string()))?,
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|err| ConfigError::Serialize(err.to_string()))?
            }
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        fs::write(path, text)?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
