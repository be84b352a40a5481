// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persistent key-value storage for templates and preferences.
//!
//! Every value is a JSON document stored under a fixed key. The template
//! manager and the language coordinator share one store; neither assumes
//! exclusive access across processes (last write wins).

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Key holding the flat array of templates.
pub const TEMPLATES_KEY: &str = "nbs-qr-templates";

/// Key holding the preferred interface language.
pub const LANGUAGE_KEY: &str = "nbs-qr-language";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded ({needed} bytes needed, {quota} allowed)")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Keys end up in file names, so keep them to a conservative alphabet.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_restricted() {
        assert!(validate_key(TEMPLATES_KEY).is_ok());
        assert!(validate_key(LANGUAGE_KEY).is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("a b").is_err());
    }
}
