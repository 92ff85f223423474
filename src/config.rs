use crate::core::types::millis;
use crate::core::{LockError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Locking engine configuration
///
/// Build it in code with the builder methods, or load it from JSON:
///
/// ```json
/// { "escalation_threshold": 8, "default_timeout_ms": 5000, "poll_interval_ms": 10 }
/// ```
///
/// A negative or missing `escalation_threshold` disables escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockerConfig {
    /// Number of entity locks a call may hold before escalating to the
    /// global lock. `None` disables escalation.
    pub escalation_threshold: Option<usize>,

    /// Timeout used by `execute_default`
    pub default_timeout: Duration,

    /// Interrupt polling granularity for cancellable waits
    pub poll_interval: Duration,
}

/// On-disk form; durations are plain milliseconds.
#[derive(Debug, Serialize, Deserialize)]
struct LockerConfigFile {
    #[serde(default)]
    escalation_threshold: Option<i64>,
    #[serde(default)]
    default_timeout_ms: Option<u64>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
}

impl LockerConfig {
    pub fn new() -> Self {
        Self {
            escalation_threshold: None,
            default_timeout: Duration::from_secs(10),
            poll_interval: crate::lock::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the escalation threshold
    pub fn escalation_threshold(mut self, threshold: usize) -> Self {
        self.escalation_threshold = Some(threshold);
        self
    }

    /// Disable escalation
    pub fn without_escalation(mut self) -> Self {
        self.escalation_threshold = None;
        self
    }

    /// Set the default timeout
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the interrupt polling interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: LockerConfigFile = serde_json::from_str(json)?;
        let defaults = Self::new();

        let config = Self {
            escalation_threshold: file
                .escalation_threshold
                .and_then(|threshold| usize::try_from(threshold).ok()),
            default_timeout: file
                .default_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            poll_interval: file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Render as JSON, in the same shape `from_json_str` accepts
    pub fn to_json(&self) -> Result<String> {
        let file = LockerConfigFile {
            escalation_threshold: self
                .escalation_threshold
                .map(|threshold| i64::try_from(threshold).unwrap_or(i64::MAX)),
            default_timeout_ms: Some(millis(self.default_timeout)),
            poll_interval_ms: Some(millis(self.poll_interval)),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(LockError::InvalidConfig(
                "poll_interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LockerConfig::default();
        assert_eq!(config.escalation_threshold, None);
        assert_eq!(config.default_timeout, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_builder_pattern() {
        let config = LockerConfig::new()
            .escalation_threshold(4)
            .default_timeout(Duration::from_millis(500))
            .poll_interval(Duration::from_millis(5));

        assert_eq!(config.escalation_threshold, Some(4));
        assert_eq!(config.default_timeout, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.without_escalation().escalation_threshold, None);
    }

    #[test]
    fn test_from_json() {
        let config = LockerConfig::from_json_str(
            r#"{ "escalation_threshold": 2, "default_timeout_ms": 1500 }"#,
        )
        .unwrap();

        assert_eq!(config.escalation_threshold, Some(2));
        assert_eq!(config.default_timeout, Duration::from_millis(1500));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_negative_threshold_disables_escalation() {
        let config = LockerConfig::from_json_str(r#"{ "escalation_threshold": -1 }"#).unwrap();
        assert_eq!(config.escalation_threshold, None);

        let config = LockerConfig::from_json_str("{}").unwrap();
        assert_eq!(config.escalation_threshold, None);
    }

    #[test]
    fn test_zero_threshold_is_enabled() {
        let config = LockerConfig::from_json_str(r#"{ "escalation_threshold": 0 }"#).unwrap();
        assert_eq!(config.escalation_threshold, Some(0));
    }

    #[test]
    fn test_invalid_json() {
        let err = LockerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, LockError::Parse(_)));

        let err = LockerConfig::from_json_str(r#"{ "poll_interval_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, LockError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_path_and_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let original = LockerConfig::new()
            .escalation_threshold(3)
            .default_timeout(Duration::from_millis(750));
        file.write_all(original.to_json().unwrap().as_bytes()).unwrap();

        let loaded = LockerConfig::from_path(file.path()).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_file() {
        let err = LockerConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, LockError::Io(_)));
    }
}
