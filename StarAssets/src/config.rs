//! Runtime configuration

use serde::Deserialize;

use crate::error::Result;

/// Configuration for an assets context.
///
/// # Example
///
/// ```
/// use starassets::AssetsConfig;
///
/// let config = AssetsConfig::new()
///     .with_replicas(4)
///     .with_time_calls(true);
/// assert_eq!(config.replicas, 4);
///
/// let parsed = AssetsConfig::from_toml_str("replicas = 2\nhidden_prefix = '_'")?;
/// assert_eq!(parsed.replicas, 2);
/// assert_eq!(parsed.hidden_prefix, '_');
/// # Ok::<(), starassets::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Number of worker replicas behind the RPC channel (at least 1).
    pub replicas: usize,

    /// Maximum entries returned by one host directory read.
    pub read_batch_size: usize,

    /// Entries whose name starts with this character are not ingested.
    pub hidden_prefix: char,

    /// Log the elapsed time of every replica call at debug level.
    pub time_calls: bool,

    /// Capacity of the caller-side event channel.
    pub event_capacity: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            replicas: 1,
            read_batch_size: 64,
            hidden_prefix: '.',
            time_calls: false,
            event_capacity: 16,
        }
    }
}

impl AssetsConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Set the number of replicas.
    #[must_use]
    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas.max(1);
        self
    }

    /// Set the host directory batch size.
    #[must_use]
    pub fn with_read_batch_size(mut self, size: usize) -> Self {
        self.read_batch_size = size.max(1);
        self
    }

    /// Set the hidden entry prefix.
    #[must_use]
    pub fn with_hidden_prefix(mut self, prefix: char) -> Self {
        self.hidden_prefix = prefix;
        self
    }

    /// Enable or disable call timing.
    #[must_use]
    pub fn with_time_calls(mut self, enabled: bool) -> Self {
        self.time_calls = enabled;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssetsConfig::default();
        assert_eq!(config.replicas, 1);
        assert_eq!(config.hidden_prefix, '.');
        assert!(!config.time_calls);
    }

    #[test]
    fn test_builder_clamps() {
        let config = AssetsConfig::new().with_replicas(0).with_read_batch_size(0);
        assert_eq!(config.replicas, 1);
        assert_eq!(config.read_batch_size, 1);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AssetsConfig::from_toml_str("time_calls = true\nread_batch_size = 8").unwrap();
        assert!(config.time_calls);
        assert_eq!(config.read_batch_size, 8);
        assert_eq!(config.replicas, 1);
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(AssetsConfig::from_toml_str("replicas = \"many\"").is_err());
    }
}
