//! Engine configuration

use celbridge_core::errors::{CommandError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CYCLE_DELAY_MS: u64 = 50;
pub const DEFAULT_MESSAGE_CAPACITY: usize = 256;

/// Tunables for the execution loop and message bus
///
/// Loaded from TOML; missing keys take their defaults.
///
/// ```toml
/// cycle_delay_ms = 20
/// message_capacity = 512
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Pause between loop cycles
    pub cycle_delay_ms: u64,
    /// Capacity of the broadcast channel used for engine messages
    pub message_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_delay_ms: DEFAULT_CYCLE_DELAY_MS,
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Config`] for malformed TOML, unknown keys or
    /// values rejected by [`EngineConfig::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| CommandError::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| CommandError::Config {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    ///
    /// Returns [`CommandError::Config`] when the loop would never yield or the
    /// message channel would have no capacity.
    pub fn validate(&self) -> Result<()> {
        if self.cycle_delay_ms == 0 {
            return Err(CommandError::Config {
                reason: "cycle_delay_ms must be greater than zero".to_string(),
            });
        }
        if self.message_capacity == 0 {
            return Err(CommandError::Config {
                reason: "message_capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cycle_delay(), Duration::from_millis(50));
        assert_eq!(config.message_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = EngineConfig::from_toml_str("cycle_delay_ms = 5").unwrap();
        assert_eq!(config.cycle_delay_ms, 5);
        assert_eq!(config.message_capacity, DEFAULT_MESSAGE_CAPACITY);
    }

    #[test]
    fn test_zero_delay_rejected() {
        let err = EngineConfig::from_toml_str("cycle_delay_ms = 0").unwrap_err();
        assert!(matches!(err, CommandError::Config { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = EngineConfig::from_toml_str("cycle_delay = 5").unwrap_err();
        assert!(matches!(err, CommandError::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "cycle_delay_ms = 10\nmessage_capacity = 32\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();

        assert_eq!(
            config,
            EngineConfig {
                cycle_delay_ms: 10,
                message_capacity: 32,
            }
        );
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        match err {
            CommandError::Config { reason } => assert!(reason.contains("not/here.toml")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }
}
