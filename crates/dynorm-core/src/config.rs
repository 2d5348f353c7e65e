//! Backend handle configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings carried by a store handle.
///
/// Deserializable so deployments can keep it next to their other settings;
/// every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prepended to every logical table name.
    pub table_prefix: String,
    /// The backend is a local/test deployment.
    ///
    /// Local deployments reject some capacity changes with a limit error that
    /// a real deployment would accept; throughput scopes ignore that error
    /// when this is set.
    pub local: bool,
    /// How often to poll `describe_table` while waiting for a table to become active.
    pub poll_interval_ms: u64,
    /// Number of capacity changes per table the in-memory engine accepts
    /// before answering with a limit error. `None` means unlimited.
    pub max_capacity_updates: Option<u32>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            local: false,
            poll_interval_ms: 1000,
            max_capacity_updates: None,
        }
    }
}

impl StoreConfig {
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn with_max_capacity_updates(mut self, max: u32) -> Self {
        self.max_capacity_updates = Some(max);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Physical table name for a logical one.
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.table_prefix, "");
        assert!(!config.local);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.max_capacity_updates, None);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"table_prefix": "zz_unit_test_", "local": true}"#).unwrap();
        assert_eq!(config.table_prefix, "zz_unit_test_");
        assert!(config.local);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_table_name_prefix() {
        let config = StoreConfig::default().with_table_prefix("dev_");
        assert_eq!(config.table_name("store"), "dev_store");
    }
}
