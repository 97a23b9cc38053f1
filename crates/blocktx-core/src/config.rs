// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Capture tuning and the storage port it is loaded through.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Key under which [`CaptureConfig`] is stored.
pub const CAPTURE_CONFIG_KEY: &str = "blocktx.capture";

/// How far accept hooks descend below the newest top-level transaction.
///
/// The top-level tail is offered first, then its side-effect chains from the
/// most recently opened one, each walked tail to head. Every candidate comes
/// before its own side effects, which are visited right after it while the
/// depth budget allows. Siblings go newest first; a node and its descendants
/// go parent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AcceptSearch {
    /// Only the top-level tail is offered the data.
    TailOnly,
    /// Descend into side-effect chains up to `max_depth` levels.
    Nested {
        /// Levels of side-effect chains to descend (0 behaves like `TailOnly`).
        max_depth: usize,
    },
}

impl AcceptSearch {
    /// Maximum number of side-effect levels searched.
    #[must_use]
    pub const fn max_depth(self) -> usize {
        match self {
            Self::TailOnly => 0,
            Self::Nested { max_depth } => max_depth,
        }
    }
}

impl Default for AcceptSearch {
    fn default() -> Self {
        Self::Nested { max_depth: 1 }
    }
}

/// Per-unit capture tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Search depth for accept hooks.
    pub accept_search: AcceptSearch,
    /// Maximum number of existing nodes offered an absorbable transaction.
    /// `None` scans the whole active chain.
    pub absorb_scan_limit: Option<usize>,
    /// Emit one `tracing` event per generated batch.
    pub trace_batches: bool,
}

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Thin service that serializes config values and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Loads the capture config, falling back to defaults when none is stored.
    pub fn capture_config(&self) -> Result<CaptureConfig, ConfigError> {
        Ok(self.load(CAPTURE_CONFIG_KEY)?.unwrap_or_default())
    }
}
