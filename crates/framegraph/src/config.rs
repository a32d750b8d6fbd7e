//! Runtime configuration file

use crate::executor::ExecutorConfig;
use crate::pool::PoolConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeConfigError {
    #[error("invalid runtime configuration: {0}")]
    Yaml(#[from] serde_norway::Error),
    #[error("failed to read runtime configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Pool and executor settings, loaded from YAML
///
/// ```yaml
/// pool:
///   max_entries: 256
///   max_bytes: 1073741824
///   retention_frames: 8
/// executor:
///   frames_in_flight: 3
/// ```
///
/// Missing keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub pool: PoolConfig,
    pub executor: ExecutorConfig,
}

impl RuntimeConfig {
    pub fn from_yaml(text: &str) -> Result<Self, RuntimeConfigError> {
        Ok(serde_norway::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuntimeConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    pub fn to_yaml(&self) -> Result<String, RuntimeConfigError> {
        Ok(serde_norway::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = RuntimeConfig::from_yaml("pool:\n  retention_frames: 8\nexecutor:\n  frames_in_flight: 3\n").unwrap();
        assert_eq!(config.pool.retention_frames, 8);
        assert_eq!(config.pool.max_entries, PoolConfig::default().max_entries);
        assert_eq!(config.executor.frames_in_flight, 3);

        assert_eq!(RuntimeConfig::from_yaml("{}").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = RuntimeConfig {
            pool: PoolConfig {
                max_entries: 16,
                max_bytes: 1 << 20,
                retention_frames: 1,
            },
            executor: ExecutorConfig { frames_in_flight: 1 },
        };
        assert_eq!(RuntimeConfig::from_yaml(&config.to_yaml().unwrap()).unwrap(), config);
    }

    #[test]
    fn test_unknown_types_are_rejected() {
        assert!(matches!(RuntimeConfig::from_yaml("pool:\n  max_entries: many\n"), Err(RuntimeConfigError::Yaml(_))));
    }
}
