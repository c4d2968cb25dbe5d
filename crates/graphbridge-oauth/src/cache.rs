//! On-disk cache for a single token record.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::token::TokenRecord;

/// Token cache backed by one JSON file.
///
/// Reads share the lock; writes and deletes take it exclusively.
#[derive(Debug)]
pub struct TokenCache {
    path: RwLock<PathBuf>,
}

impl TokenCache {
    /// Creates a cache for the given file path. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: RwLock::new(path.into()),
        }
    }

    /// Returns the backing file path.
    pub async fn path(&self) -> PathBuf {
        self.path.read().await.clone()
    }

    /// Loads the cached token.
    ///
    /// Any error means there is no usable cached token.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// record is expired.
    pub async fn load(&self) -> Result<TokenRecord> {
        let path = self.path.read().await;

        let data = tokio::fs::read(&*path).await.map_err(|e| {
            debug!(path = %path.display(), error = %e, "Token cache not readable");
            e
        })?;

        let record: TokenRecord = serde_json::from_slice(&data).map_err(|e| {
            error!(path = %path.display(), error = %e, "Token cache is not valid JSON");
            e
        })?;

        if record.is_expired() {
            debug!("Cached token is expired");
            return Err(Error::TokenExpired);
        }

        debug!("Loaded token from cache");
        Ok(record)
    }

    /// Stamps `cached_at` and writes the record with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub async fn save(&self, record: &mut TokenRecord) -> Result<()> {
        let path = self.path.write().await;

        record.cached_at = Some(Utc::now());
        let data = serde_json::to_vec_pretty(record)?;

        if let Err(e) = write_private(&path, &data).await {
            error!(path = %path.display(), error = %e, "Failed to write token cache");
            return Err(e.into());
        }

        debug!(path = %path.display(), "Saved token to cache");
        Ok(())
    }

    /// Deletes the cache file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        let path = self.path.write().await;

        match tokio::fs::remove_file(&*path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to delete token cache");
                return Err(e.into());
            }
        }

        debug!("Cleared token cache");
        Ok(())
    }
}

/// Writes `data` to `path`, creating it with mode 0600 on unix.
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;

    // mode() only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cache_in(dir: &tempfile::TempDir) -> TokenCache {
        TokenCache::new(dir.path().join("token_cache.json"))
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        let mut record = TokenRecord::new("access-abc", 3600)
            .with_refresh_token("refresh-xyz")
            .with_scope("User.Read Mail.Send");
        cache.save(&mut record).await.unwrap();
        assert!(record.cached_at.is_some());

        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.access_token, "access-abc");
        assert_eq!(loaded.refresh_token, "refresh-xyz");
        assert_eq!(loaded.scope, "User.Read Mail.Send");
        assert!(loaded.cached_at.is_some());
    }

    #[tokio::test]
    async fn test_save_overwrites_cached_at() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        let old = Utc::now() - Duration::days(2);
        let mut record = TokenRecord::new("a", 3600).with_cached_at(old);
        cache.save(&mut record).await.unwrap();

        assert!(record.cached_at.unwrap() > old);
        assert!(cache.load().await.is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        assert!(matches!(cache.load().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(cache.path().await, b"{not json")
            .await
            .unwrap();
        assert!(matches!(cache.load().await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_load_expired_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        let record = TokenRecord::new("a", 3600).with_cached_at(Utc::now() - Duration::seconds(3400));
        let data = serde_json::to_vec(&record).unwrap();
        tokio::fs::write(cache.path().await, data).await.unwrap();

        assert!(matches!(cache.load().await, Err(Error::TokenExpired)));
    }

    #[tokio::test]
    async fn test_load_record_without_cached_at() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(
            cache.path().await,
            br#"{"access_token":"a","token_type":"Bearer","expires_in":3600}"#,
        )
        .await
        .unwrap();

        assert!(matches!(cache.load().await, Err(Error::TokenExpired)));
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        cache.clear().await.unwrap();

        let mut record = TokenRecord::new("a", 3600);
        cache.save(&mut record).await.unwrap();
        cache.clear().await.unwrap();
        assert!(!cache.path().await.exists());
        assert!(cache.load().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let mut record = TokenRecord::new("a", 3600);
        cache.save(&mut record).await.unwrap();

        let mode = std::fs::metadata(cache.path().await)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_concurrent_readers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(cache_in(&dir));
        let mut record = TokenRecord::new("shared", 3600);
        cache.save(&mut record).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.load().await.map(|r| r.access_token) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "shared");
        }
    }
}
