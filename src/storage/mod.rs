//! Durable key/value storage for the session's token pair.
//!
//! DESIGN
//! ======
//! Two string values live under fixed keys (`token`, `refreshToken`), read
//! once at session construction and rewritten on every token change.
//! `FileStorage` keeps them in one JSON object on disk; `MemoryStorage` is
//! for tests and throwaway sessions.
//!
//! TRADE-OFFS
//! ==========
//! `FileStorage` re-reads the file on every access instead of caching, so an
//! external edit (or deletion) is seen on the next read. Writes go through a
//! temp file + rename so a crash never leaves a half-written session file.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key holding the access token.
pub const TOKEN_KEY: &str = "token";
/// Key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key/value store that survives process restarts.
pub trait TokenStorage: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
