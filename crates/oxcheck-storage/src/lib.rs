//! Persisted per-host state: discovered autochecks and value stores.
//!
//! Autochecks live in one JSON file per host ([`autochecks::FileAutocheckStore`]),
//! replaced atomically on every write. Value stores live in a single SQLite
//! database ([`value_store::SqliteValueStore`]) where a host's rows are
//! replaced inside one transaction. [`locks::HostLocks`] keeps two cycles of
//! the same host from running at once.

pub mod autochecks;
pub mod error;
pub mod locks;
pub mod value_store;


use error::{Result, StorageError};
use oxcheck_common::types::AutocheckEntry;
use oxcheck_plugin::value_store::HostValueStore;

pub use autochecks::FileAutocheckStore;
pub use locks::{HostGuard, HostLocks};
pub use value_store::SqliteValueStore;

/// Host-keyed store of discovered services.
///
/// Implementations must replace a host's record as a whole: a reader sees
/// either the previous or the new complete entry set, never a mix.
pub trait AutocheckStore: Send + Sync {
    /// Entries of the host; an unknown host has none.
    fn read(&self, host: &str) -> Result<Vec<AutocheckEntry>>;

    /// Atomically replaces all entries of the host.
    fn write(&self, host: &str, entries: &[AutocheckEntry]) -> Result<()>;

    fn remove(&self, host: &str) -> Result<()>;

    /// Hosts that have a persisted record.
    fn hosts(&self) -> Result<Vec<String>>;
}

/// Host-keyed store of value-store entries.
pub trait ValueStoreBackend: Send + Sync {
    fn load(&self, host: &str) -> Result<HostValueStore>;

    /// Replaces every entry of the host in one transaction.
    fn save(&self, host: &str, store: &HostValueStore) -> Result<()>;

    fn remove_host(&self, host: &str) -> Result<()>;
}

/// Rejects host names that cannot safely serve as a file name.
pub fn validate_host_name(host: &str) -> Result<()> {
    let valid = !host.is_empty()
        && !host.starts_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidHostName(host.to_string()))
    }
}
