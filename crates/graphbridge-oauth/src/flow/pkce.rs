//! PKCE (Proof Key for Code Exchange) implementation for `OAuth2`.
//!
//! PKCE (RFC 7636) enhances security for public clients by preventing
//! authorization code interception attacks.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Number of random bytes behind a code verifier.
const VERIFIER_BYTES: usize = 32;

/// PKCE code challenge and verifier pair.
///
/// Lives only for the duration of one authorization attempt.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    verifier: String,
    challenge: String,
}

impl PkceChallenge {
    /// Generates a new PKCE pair.
    ///
    /// The verifier is 32 random bytes encoded as unpadded URL-safe base64
    /// (43 characters).
    #[must_use]
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; VERIFIER_BYTES];
        OsRng.fill_bytes(&mut random_bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Builds the pair from an existing verifier.
    #[must_use]
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Computes the S256 code challenge for a verifier.
    #[must_use]
    pub fn compute_challenge(verifier: &str) -> String {
        let hash = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }

    /// Returns the verifier.
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Returns the challenge.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Returns the method.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        "S256"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pkce_generation() {
        let pkce = PkceChallenge::generate();
        assert!(!pkce.verifier().is_empty());
        assert!(!pkce.challenge().is_empty());
        assert_eq!(pkce.method(), "S256");
        assert_ne!(pkce.verifier(), pkce.challenge());
    }

    #[test]
    fn test_verifier_length() {
        let pkce = PkceChallenge::generate();
        assert_eq!(pkce.verifier().len(), 43);
        assert!(!pkce.verifier().contains('='));
    }

    #[test]
    fn test_known_challenge() {
        // RFC 7636 appendix B
        let pkce = PkceChallenge::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(
            pkce.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_multiple_generations_unique() {
        let pkce1 = PkceChallenge::generate();
        let pkce2 = PkceChallenge::generate();
        assert_ne!(pkce1.verifier(), pkce2.verifier());
        assert_ne!(pkce1.challenge(), pkce2.challenge());
    }

    proptest! {
        #[test]
        fn challenge_is_unpadded_sha256(bytes in proptest::collection::vec(any::<u8>(), 32)) {
            let verifier = URL_SAFE_NO_PAD.encode(&bytes);
            let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

            let first = PkceChallenge::from_verifier(verifier.clone());
            let second = PkceChallenge::from_verifier(verifier);

            prop_assert_eq!(first.challenge(), expected.as_str());
            prop_assert_eq!(first.challenge(), second.challenge());
            prop_assert!(!first.challenge().contains('='));
        }
    }
}
