//! Tunable knobs the original hardcodes as C preprocessor constants.
//!
//! The core never reads or writes a config file itself — a host terminal
//! owns that I/O and hands this crate a parsed [`Config`], matching the "no
//! core CLI surface" non-goal. [`Config::from_toml_str`] exists so a host
//! can embed the knobs below inside its own larger config file.

use serde::{Deserialize, Serialize};

/// `STORAGE_LIMIT` in the original: ~320 MiB.
const DEFAULT_STORAGE_LIMIT_BYTES: usize = 320 * 1024 * 1024;

/// `MAX_DATA_SZ` in the original: 4 * 10^8 bytes.
const DEFAULT_MAX_DIRECT_TRANSMISSION_BYTES: usize = 400_000_000;

/// The original rejects `data_width`/`data_height` over 10,000 before
/// allocating anything (`graphics.c:365`).
const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 10_000;

#[derive(Default, Deserialize, Serialize)]
struct Data {
    storage_limit_bytes: Option<usize>,
    max_direct_transmission_bytes: Option<usize>,
    max_image_dimension: Option<u32>,
    gpu_uploads_enabled: Option<bool>,
}

/// Runtime configuration for a [`GraphicsManager`](crate::manager::GraphicsManager).
pub struct Config {
    data: Data,
}

impl Config {
    /// Parses `toml`, tolerating a missing or partially-specified document —
    /// any field left out falls back to its default, mirroring how the
    /// teacher's own `Config::read` treats an unparsable file as an empty one
    /// rather than a hard error.
    pub fn from_toml_str(toml: &str) -> Self {
        Self {
            data: toml::from_str(toml).unwrap_or_default(),
        }
    }

    /// The quota the storage & eviction component enforces after every
    /// successful add. Value will be at least 1 MiB. The default is 320 MiB.
    pub fn storage_limit_bytes(&self) -> usize {
        self.data
            .storage_limit_bytes
            .unwrap_or(DEFAULT_STORAGE_LIMIT_BYTES)
            .max(1024 * 1024)
    }

    /// The hard cap on a single direct (inline) transmission's accumulated
    /// size, across all chunks. The default is 400,000,000 bytes.
    pub fn max_direct_transmission_bytes(&self) -> usize {
        self.data
            .max_direct_transmission_bytes
            .unwrap_or(DEFAULT_MAX_DIRECT_TRANSMISSION_BYTES)
    }

    /// The largest `data_width`/`data_height` the assembler accepts before
    /// allocating a load buffer. The default is 10,000.
    pub fn max_image_dimension(&self) -> u32 {
        self.data
            .max_image_dimension
            .unwrap_or(DEFAULT_MAX_IMAGE_DIMENSION)
    }

    /// Whether a successful decode is handed to the GPU collaborator
    /// (`upload_texture`) or retained in memory. Tests set this to `false`,
    /// mirroring the original's `send_to_gpu` static.
    pub fn gpu_uploads_enabled(&self) -> bool {
        self.data.gpu_uploads_enabled.unwrap_or(true)
    }

    /// Builder-style override, used by the test-mode constructor.
    pub fn with_gpu_uploads_enabled(mut self, enabled: bool) -> Self {
        self.data.gpu_uploads_enabled = Some(enabled);
        self
    }

    /// Builder-style override for the storage quota, used by eviction tests
    /// that want a small quota rather than the real 320 MiB default.
    pub fn with_storage_limit_bytes(mut self, limit: usize) -> Self {
        self.data.storage_limit_bytes = Some(limit);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: Data::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_original_constants() {
        let config = Config::default();

        assert_eq!(config.storage_limit_bytes(), 320 * 1024 * 1024);
        assert_eq!(config.max_direct_transmission_bytes(), 400_000_000);
        assert_eq!(config.max_image_dimension(), 10_000);
        assert!(config.gpu_uploads_enabled());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str("storage_limit_bytes = 1048576\n");

        assert_eq!(config.storage_limit_bytes(), 1024 * 1024);
        assert_eq!(config.max_image_dimension(), 10_000);
    }

    #[test]
    fn garbage_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str("not valid toml {{{");

        assert_eq!(config.storage_limit_bytes(), 320 * 1024 * 1024);
    }
}
