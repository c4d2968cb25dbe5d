//! Configuration file management.
//!
//! The file lives at `~/.graphbridge/config.json`. The directory is created
//! with mode 0700 and the file is written with mode 0600, since it holds
//! the SMTP password in clear text.

mod model;

pub use model::{
    Config, DEFAULT_AUTHORITY_URL, DEFAULT_CLIENT_ID, DEFAULT_REDIRECT_URI, DEFAULT_SMTP_HOST,
    DEFAULT_SMTP_PORT, DEFAULT_SMTP_USERNAME, GraphConfig, PASSWORD_LENGTH, SmtpConfig,
    TOKEN_CACHE_FILE_NAME, generate_password,
};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Config directory name under the home directory.
pub const CONFIG_DIR_NAME: &str = ".graphbridge";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Owns the loaded configuration and the file it came from.
#[derive(Debug, Clone)]
pub struct Manager {
    path: PathBuf,
    config: Config,
}

impl Manager {
    /// Opens `~/.graphbridge/config.json`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory is unknown, or see
    /// [`Manager::open`].
    pub async fn open_default() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?;
        Self::open(home.join(CONFIG_DIR_NAME)).await
    }

    /// Opens the config file in `dir`, initializing it with defaults if it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the file cannot
    /// be read or written, or it is not valid JSON.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        create_private_dir(&dir).await?;

        let path = dir.join(CONFIG_FILE_NAME);
        match Self::load(&path).await {
            Ok(manager) => Ok(manager),
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, creating defaults");
                Self::initialize(path).await
            }
            Err(e) => Err(e),
        }
    }

    /// Loads an existing config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read (`NotFound` if it is
    /// missing) or [`Error::Serde`] if it is not valid.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = tokio::fs::read_to_string(&path).await?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "config loaded");
        Ok(Self { path, config })
    }

    /// Writes a default configuration, with a new random password, to
    /// `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn initialize(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let manager = Self {
            config: Config::defaults(dir),
            path,
        };
        manager.save().await?;
        Ok(manager)
    }

    /// Saves the configuration as pretty JSON with mode 0600.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.config)?;
        write_private(&self.path, json.as_bytes()).await?;
        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    /// Returns the whole configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the SMTP settings.
    #[must_use]
    pub const fn smtp(&self) -> &SmtpConfig {
        &self.config.smtp
    }

    /// Returns the Graph settings.
    #[must_use]
    pub const fn graph(&self) -> &GraphConfig {
        &self.config.graph
    }

    /// Changes the SMTP port and saves the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the save fails; the in-memory value is updated
    /// regardless.
    pub async fn update_smtp_port(&mut self, port: u16) -> Result<()> {
        self.config.smtp.port = port;
        self.save().await
    }

    /// Returns the config file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn create_private_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
    }
    Ok(())
}

/// Writes `data` to `path`, creating it with mode 0600 on unix.
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_initializes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR_NAME);

        let manager = Manager::open(&config_dir).await.unwrap();
        assert_eq!(manager.path(), config_dir.join(CONFIG_FILE_NAME));
        assert!(manager.path().exists());
        assert_eq!(manager.smtp().port, DEFAULT_SMTP_PORT);
        assert_eq!(manager.graph().token_cache, config_dir.join(TOKEN_CACHE_FILE_NAME));

        // a second open reads the same file back, password included
        let reopened = Manager::open(&config_dir).await.unwrap();
        assert_eq!(reopened.config(), manager.config());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR_NAME);
        let manager = Manager::open(&config_dir).await.unwrap();

        let dir_mode = std::fs::metadata(&config_dir).unwrap().permissions().mode();
        let file_mode = std::fs::metadata(manager.path()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_update_smtp_port_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = Manager::open(dir.path()).await.unwrap();
        manager.update_smtp_port(2600).await.unwrap();

        let reloaded = Manager::load(manager.path()).await.unwrap();
        assert_eq!(reloaded.smtp().port, 2600);
        assert_eq!(reloaded.smtp().password, manager.smtp().password);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{not json").unwrap();

        let result = Manager::open(dir.path()).await;
        assert!(matches!(result, Err(Error::Serde(_))));
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = Manager::load(dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound));
    }
}
