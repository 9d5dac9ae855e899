//! Storage configuration.

use std::path::PathBuf;

/// Default page cache capacity (256 MB).
pub const DEFAULT_CACHE_CAPACITY: u64 = 256 * 1024 * 1024;

/// Default flush interval in milliseconds.
pub const DEFAULT_FLUSH_EVERY_MS: u64 = 500;

/// Default maximum encoded document size (1 MB).
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// Default number of per-topic write lock stripes.
pub const DEFAULT_WRITE_LOCK_STRIPES: usize = 64;

/// Configuration for the storage engine.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush only on shutdown.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Largest encoded document the store accepts, in bytes.
    pub max_document_size: usize,

    /// Number of lock stripes serializing writes to the same topic.
    pub write_lock_stripes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./repubsub_data"),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            flush_every_ms: Some(DEFAULT_FLUSH_EVERY_MS),
            compression: false,
            temporary: false,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            write_lock_stripes: DEFAULT_WRITE_LOCK_STRIPES,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary in-memory configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the maximum encoded document size.
    pub fn with_max_document_size(mut self, size: usize) -> Self {
        self.max_document_size = size;
        self
    }

    /// Set the number of write lock stripes.
    pub fn with_write_lock_stripes(mut self, stripes: usize) -> Self {
        self.write_lock_stripes = stripes.max(1);
        self
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        if let Some(ms) = self.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }

        config
    }
}
