// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use blocktx_core::{ConfigError, ConfigStore};

/// In-memory implementation of [`ConfigStore`] for testing.
///
/// Clones share state. Call counts include failed attempts.
///
/// # Example
///
/// ```
/// use blocktx_core::{CaptureConfig, ConfigService};
/// use blocktx_dry_tests::InMemoryConfigStore;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// assert_eq!(service.capture_config().ok(), Some(CaptureConfig::default()));
/// assert_eq!(store.load_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
}

impl InMemoryConfigStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `json` under `key`.
    pub fn with_json(key: &str, json: &str) -> Self {
        let store = Self::new();
        store
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .insert(key.to_owned(), json.as_bytes().to_vec());
        store
    }

    /// Configure the store to fail on load operations.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fail_on_load = fail;
    }

    /// Number of `load_raw` attempts.
    pub fn load_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .load_count
    }

    /// Number of `save_raw` attempts.
    pub fn save_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .save_count
    }

    /// Check if a key exists in the store.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .contains_key(key)
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.save_count += 1;
        inner.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocktx_core::{AcceptSearch, CaptureConfig, ConfigService, CAPTURE_CONFIG_KEY};

    #[test]
    fn missing_key_loads_default_capture_config() {
        let service = ConfigService::new(InMemoryConfigStore::new());
        let config = service.capture_config().unwrap();
        assert_eq!(config, CaptureConfig::default());
    }

    #[test]
    fn stored_capture_config_round_trips() {
        let store = InMemoryConfigStore::new();
        let service = ConfigService::new(store.clone());
        let config = CaptureConfig {
            accept_search: AcceptSearch::TailOnly,
            absorb_scan_limit: Some(4),
            trace_batches: true,
        };
        service.save(CAPTURE_CONFIG_KEY, &config).unwrap();
        assert!(store.contains_key(CAPTURE_CONFIG_KEY));
        assert_eq!(service.capture_config().unwrap(), config);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let store = InMemoryConfigStore::with_json(
            CAPTURE_CONFIG_KEY,
            r#"{ "accept_search": { "mode": "nested", "max_depth": 3 } }"#,
        );
        let config = ConfigService::new(store).capture_config().unwrap();
        assert_eq!(config.accept_search.max_depth(), 3);
        assert!(!config.trace_batches);
    }

    #[test]
    fn load_failure_surfaces() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_load(true);
        let result = ConfigService::new(store.clone()).capture_config();
        assert!(matches!(result, Err(ConfigError::Other(_))));
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let store = InMemoryConfigStore::with_json(CAPTURE_CONFIG_KEY, "{ not json");
        let result = ConfigService::new(store).capture_config();
        assert!(matches!(result, Err(ConfigError::Serde(_))));
    }

    #[test]
    fn hand_written_json_value_is_accepted() {
        let store = InMemoryConfigStore::new();
        let service = ConfigService::new(store);
        service
            .save(CAPTURE_CONFIG_KEY, &serde_json::json!({ "absorb_scan_limit": 2 }))
            .unwrap();
        let config = service.capture_config().unwrap();
        assert_eq!(config.absorb_scan_limit, Some(2));
        assert_eq!(config.accept_search, AcceptSearch::default());
    }
}
