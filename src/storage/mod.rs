//! Local persistence backends.
//!
//! Every store sits on top of [`Backend`] and goes through [`attempt`], so a
//! broken or missing backend degrades to "nothing stored" instead of an error.

pub mod cookie;
pub mod tab;

use thiserror::Error;
use tracing::debug;

pub use self::cookie::CookieJar;
pub use self::tab::TabStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable")]
    Unavailable,

    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stored value: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal key/value capability shared by the cookie jar and tab storage.
pub trait Backend: Send + Sync {
    fn read(&self, key: &str) -> StorageResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Run a storage operation, turning any failure into `default`.
pub fn attempt<T>(what: &str, default: T, op: impl FnOnce() -> StorageResult<T>) -> T {
    match op() {
        Ok(value) => value,
        Err(e) => {
            debug!("{what} failed, ignoring: {e}");
            default
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A backend that fails every operation.
    pub struct Broken;

    impl Backend for Broken {
        fn read(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Io(std::io::Error::other("read failed")))
        }
        fn write(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("quota exceeded")))
        }
        fn remove(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_passes_through_success() {
        assert_eq!(attempt("read", 0, || Ok(7)), 7);
    }

    #[test]
    fn attempt_swallows_errors() {
        let got: Option<String> = attempt("read", None, || Err(StorageError::Unavailable));
        assert!(got.is_none());
    }
}
