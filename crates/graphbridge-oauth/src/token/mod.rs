//! `OAuth2` token records and expiry rules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds subtracted from a token's lifetime before it counts as expired.
///
/// Keeps a token from being handed out when it would lapse mid-request.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// Cached `OAuth2` token with metadata.
///
/// `cached_at` is stamped by [`TokenCache::save`](crate::TokenCache::save);
/// a record that was never saved is always expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Access token string.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: String,
    /// Lifetime in seconds, counted from `cached_at`.
    #[serde(default)]
    pub expires_in: i64,
    /// Refresh token (stored, not used for silent renewal).
    #[serde(default)]
    pub refresh_token: String,
    /// Scope granted by authorization server.
    #[serde(default)]
    pub scope: String,
    /// When the record was written to the cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Creates a new unsaved token record.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: String::new(),
            scope: String::new(),
            cached_at: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = refresh_token.into();
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the cache timestamp.
    #[must_use]
    pub const fn with_cached_at(mut self, cached_at: DateTime<Utc>) -> Self {
        self.cached_at = Some(cached_at);
        self
    }

    /// Returns the absolute expiry time, if the record has been cached.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.cached_at
            .map(|cached| cached + Duration::seconds(self.expires_in))
    }

    /// Checks if the token is expired (with a 300 second buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Checks expiry against a given instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at()
            .is_none_or(|exp| now + Duration::seconds(EXPIRY_BUFFER_SECS) >= exp)
    }

    /// Time left until the token expires, zero if already expired.
    #[must_use]
    pub fn remaining_validity(&self) -> std::time::Duration {
        self.expires_at()
            .and_then(|exp| (exp - Utc::now()).to_std().ok())
            .unwrap_or_default()
    }
}

/// Token response from the `OAuth2` token endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type.
    #[serde(default)]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: i64,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// Scope.
    #[serde(default)]
    pub scope: String,
}

impl From<TokenResponse> for TokenRecord {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            scope: response.scope,
            cached_at: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_unsaved_record_is_expired() {
        let token = TokenRecord::new("access123", 3600);
        assert!(token.cached_at.is_none());
        assert!(token.is_expired());
        assert_eq!(token.remaining_validity(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_expiry_buffer() {
        let now = Utc::now();

        let fresh = TokenRecord::new("a", 3600).with_cached_at(now - Duration::seconds(3000));
        assert!(!fresh.is_expired_at(now));

        let stale = TokenRecord::new("a", 3600).with_cached_at(now - Duration::seconds(3400));
        assert!(stale.is_expired_at(now));
    }

    #[test]
    fn test_expiry_boundary_is_expired() {
        let now = Utc::now();
        let token = TokenRecord::new("a", 3600).with_cached_at(now - Duration::seconds(3300));
        assert!(token.is_expired_at(now));
    }

    #[test]
    fn test_remaining_validity() {
        let token = TokenRecord::new("a", 3600).with_cached_at(Utc::now());
        let remaining = token.remaining_validity().as_secs();
        assert!(remaining > 3500 && remaining <= 3600);
    }

    #[test]
    fn test_from_response() {
        let json = r#"{
            "access_token": "test_token",
            "token_type": "Bearer",
            "expires_in": 3599,
            "refresh_token": "refresh",
            "scope": "User.Read Mail.Send"
        }"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let token = TokenRecord::from(response);

        assert_eq!(token.access_token, "test_token");
        assert_eq!(token.expires_in, 3599);
        assert_eq!(token.refresh_token, "refresh");
        assert!(token.cached_at.is_none());
    }

    #[test]
    fn test_response_without_refresh_token() {
        let json = r#"{"access_token": "t", "token_type": "Bearer", "expires_in": 60}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(response.refresh_token.is_empty());
        assert!(response.scope.is_empty());
    }

    #[test]
    fn test_record_serializes_cache_fields() {
        let token = TokenRecord::new("a", 10)
            .with_refresh_token("r")
            .with_scope("s")
            .with_cached_at(Utc::now());
        let value = serde_json::to_value(&token).unwrap();
        for field in [
            "access_token",
            "token_type",
            "expires_in",
            "refresh_token",
            "scope",
            "cached_at",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
    }
}
