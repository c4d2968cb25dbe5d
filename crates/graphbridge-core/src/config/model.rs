//! Configuration file model.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_API_BASE_URL;

/// Public client id registered for graphbridge.
pub const DEFAULT_CLIENT_ID: &str = "b1fac4bf-c5c6-4170-89e0-7a7bb9ef35f2";

/// Default OAuth redirect URI served by the local callback listener.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5225/callback";

/// Default Microsoft identity authority.
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com/common";

/// Default SMTP listen host.
pub const DEFAULT_SMTP_HOST: &str = "localhost";

/// Default SMTP listen port.
pub const DEFAULT_SMTP_PORT: u16 = 2525;

/// Default SMTP username.
pub const DEFAULT_SMTP_USERNAME: &str = "msgraph";

/// Length of the generated SMTP password.
pub const PASSWORD_LENGTH: usize = 32;

/// Token cache file name, next to the config file.
pub const TOKEN_CACHE_FILE_NAME: &str = "token_cache.json";

/// Full configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// SMTP listener settings.
    pub smtp: SmtpConfig,
    /// Microsoft Graph and OAuth settings.
    pub graph: GraphConfig,
}

/// SMTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Username clients authenticate with.
    pub username: String,
    /// Password clients authenticate with.
    pub password: String,
}

/// Microsoft Graph and OAuth settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Application (client) id.
    pub client_id: String,
    /// Loopback redirect URI.
    pub redirect_uri: String,
    /// Authority, e.g. `https://login.microsoftonline.com/common`.
    pub authority_url: String,
    /// Path of the token cache file.
    pub token_cache: PathBuf,
    /// Graph API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Config {
    /// Builds the first-run configuration for a config directory.
    ///
    /// The SMTP password is freshly generated.
    #[must_use]
    pub fn defaults(config_dir: &Path) -> Self {
        Self {
            smtp: SmtpConfig {
                host: DEFAULT_SMTP_HOST.to_string(),
                port: DEFAULT_SMTP_PORT,
                username: DEFAULT_SMTP_USERNAME.to_string(),
                password: generate_password(PASSWORD_LENGTH),
            },
            graph: GraphConfig {
                client_id: DEFAULT_CLIENT_ID.to_string(),
                redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
                authority_url: DEFAULT_AUTHORITY_URL.to_string(),
                token_cache: config_dir.join(TOKEN_CACHE_FILE_NAME),
                api_base_url: default_api_base_url(),
            },
        }
    }
}

impl SmtpConfig {
    /// Returns `host:port`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Generates a random password of URL-safe base64 characters.
#[must_use]
pub fn generate_password(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill(&mut bytes[..]);
    let mut password = URL_SAFE.encode(&bytes);
    password.truncate(length);
    password
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_password() {
        let a = generate_password(32);
        let b = generate_password(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::defaults(Path::new("/home/u/.graphbridge"));
        assert_eq!(config.smtp.addr(), "localhost:2525");
        assert_eq!(config.smtp.username, "msgraph");
        assert_eq!(config.smtp.password.len(), PASSWORD_LENGTH);
        assert_eq!(config.graph.redirect_uri, "http://localhost:5225/callback");
        assert_eq!(
            config.graph.token_cache,
            Path::new("/home/u/.graphbridge/token_cache.json")
        );
        assert_eq!(config.graph.api_base_url, "https://graph.microsoft.com/v1.0");
    }

    #[test]
    fn test_missing_api_base_url_gets_default() {
        let json = r#"{
            "smtp": {"host": "127.0.0.1", "port": 2600, "username": "u", "password": "p"},
            "graph": {
                "client_id": "id",
                "redirect_uri": "http://localhost:5225/callback",
                "authority_url": "https://login.microsoftonline.com/common",
                "token_cache": "/tmp/token_cache.json"
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.smtp.port, 2600);
        assert_eq!(config.graph.api_base_url, DEFAULT_API_BASE_URL);
    }
}
