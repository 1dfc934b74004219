//! Durable client-side key/value storage and the token store built on it.
//!
//! `FileStorage` plays the role browser `localStorage` plays for a web client:
//! a small string-keyed map that survives restarts. `TokenStore` is the only
//! code that knows which keys hold the session.

mod file;
mod memory;
mod token;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use token::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore, USER_KEY};

/// Errors from a storage backend. Never surfaced by `TokenStore` getters.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is corrupt: {0}")]
    Corrupt(String),
}

/// String-keyed persistent storage.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Write several entries. Backends that can do it in one step override this.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove several entries. Backends that can do it in one step override this.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}
