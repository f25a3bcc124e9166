//! The five grant-artifact kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a stored grant artifact. Each kind has its own table and its own
/// signature namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AuthorizationCode,
    AccessToken,
    RefreshToken,
    PkceVerifier,
    OidcSession,
}

impl TokenKind {
    /// Every kind, in cascade order.
    pub const ALL: [TokenKind; 5] = [
        TokenKind::AuthorizationCode,
        TokenKind::AccessToken,
        TokenKind::RefreshToken,
        TokenKind::PkceVerifier,
        TokenKind::OidcSession,
    ];

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            TokenKind::AuthorizationCode => "oauth2_code",
            TokenKind::AccessToken => "oauth2_access",
            TokenKind::RefreshToken => "oauth2_refresh",
            TokenKind::PkceVerifier => "oauth2_pkce",
            TokenKind::OidcSession => "oauth2_oidc",
        }
    }

    /// Whether an inactive row of this kind is reported as a replay.
    pub fn detects_replay(self) -> bool {
        matches!(self, TokenKind::AuthorizationCode)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::AuthorizationCode => "authorization_code",
            TokenKind::AccessToken => "access_token",
            TokenKind::RefreshToken => "refresh_token",
            TokenKind::PkceVerifier => "pkce_verifier",
            TokenKind::OidcSession => "oidc_session",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tables_are_distinct() {
        let tables: HashSet<_> = TokenKind::ALL.iter().map(|k| k.table()).collect();
        assert_eq!(tables.len(), TokenKind::ALL.len());
    }

    #[test]
    fn only_codes_detect_replay() {
        let replaying: Vec<_> = TokenKind::ALL
            .into_iter()
            .filter(|k| k.detects_replay())
            .collect();
        assert_eq!(replaying, vec![TokenKind::AuthorizationCode]);
    }

    #[test]
    fn display_matches_serde_name() {
        for kind in TokenKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
