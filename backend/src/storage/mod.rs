//! Storage backends.

pub mod filesystem;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AppError, Result};

/// Storage backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store content with the given key
    async fn put(&self, key: &str, content: Bytes) -> Result<()>;

    /// Retrieve content by key
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete content by key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Stable public URL under which the content is served
    fn public_url(&self, key: &str) -> String;
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(AppError::Storage(format!("Invalid storage key: {:?}", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_nested_keys() {
        assert!(validate_key("games/abc/game.html").is_ok());
        assert!(validate_key("thumb.png").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("games/../../x").is_err());
        assert!(validate_key("/abs/path").is_err());
        assert!(validate_key("games//x").is_err());
        assert!(validate_key("games\\x").is_err());
        assert!(validate_key("").is_err());
    }
}
