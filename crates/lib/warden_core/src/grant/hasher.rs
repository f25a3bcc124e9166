//! Signature-to-storage-key transform.

use sha2::{Digest, Sha384};

use super::TokenKind;

/// Length of a hashed storage key: hex-encoded SHA-384.
pub const HASHED_KEY_LEN: usize = 96;

/// Maps a token signature to the key it is stored under.
///
/// When enabled, access-token signatures are replaced by their SHA-384 hex
/// digest so the bearer value is not kept at rest. Every other kind is stored
/// verbatim.
#[derive(Debug, Clone, Copy)]
pub struct SignatureHasher {
    enabled: bool,
}

impl SignatureHasher {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Storage key for `signature` of the given kind.
    pub fn transform(&self, signature: &str, kind: TokenKind) -> String {
        match kind {
            TokenKind::AccessToken if self.enabled => {
                format!("{:x}", Sha384::digest(signature.as_bytes()))
            }
            TokenKind::AuthorizationCode
            | TokenKind::AccessToken
            | TokenKind::RefreshToken
            | TokenKind::PkceVerifier
            | TokenKind::OidcSession => signature.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_is_identity_for_every_kind() {
        let hasher = SignatureHasher::new(false);
        for kind in TokenKind::ALL {
            assert_eq!(hasher.transform("abc", kind), "abc");
        }
    }

    #[test]
    fn enabled_hashes_only_access_tokens() {
        let hasher = SignatureHasher::new(true);
        for kind in TokenKind::ALL {
            let key = hasher.transform("abc", kind);
            if kind == TokenKind::AccessToken {
                assert_ne!(key, "abc");
            } else {
                assert_eq!(key, "abc");
            }
        }
    }

    #[test]
    fn hashed_key_has_fixed_length() {
        let hasher = SignatureHasher::new(true);
        let short = hasher.transform("a", TokenKind::AccessToken);
        let long = hasher.transform(&"x".repeat(4096), TokenKind::AccessToken);
        assert_eq!(short.len(), HASHED_KEY_LEN);
        assert_eq!(long.len(), HASHED_KEY_LEN);
    }

    #[test]
    fn known_digest() {
        let hasher = SignatureHasher::new(true);
        assert_eq!(
            hasher.transform("abc", TokenKind::AccessToken),
            "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
             8086072ba1e7cc2358baeca134c825a7"
        );
    }

    #[test]
    fn transform_is_deterministic() {
        let hasher = SignatureHasher::new(true);
        assert_eq!(
            hasher.transform("sig", TokenKind::AccessToken),
            hasher.transform("sig", TokenKind::AccessToken)
        );
    }
}
