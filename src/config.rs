//! TOML configuration for the terminal front end.
//!
//! Every field is optional; CLI flags override whatever the file sets.
//!
//! ```toml
//! size = 4
//! target = 2048
//! seed = 42
//! best_score_file = "best.json"
//! trace_dir = "runs"
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::{Tile, DEFAULT_SIZE, DEFAULT_TARGET};
use crate::session::SessionConfig;

pub const MIN_SIZE: usize = 2;
/// Trace files store the size in one byte and each cell as a one-byte exponent.
pub const MAX_SIZE: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub size: usize,
    pub target: Tile,
    /// Fixed RNG seed; `None` draws from OS entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            target: DEFAULT_TARGET,
            seed: None,
            best_score_file: None,
            trace_dir: None,
        }
    }
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = std::fs::File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.size) {
            return Err(ConfigError::Invalid(format!(
                "size must be between {} and {}, got {}",
                MIN_SIZE, MAX_SIZE, self.size
            )));
        }
        if self.target < 4 || !self.target.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "target must be a power of two >= 4, got {}",
                self.target
            )));
        }
        Ok(())
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig { size: self.size, target: self.target }
    }
}
