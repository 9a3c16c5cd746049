use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::AuthProvider;

/// Type of JWT: access, refresh, or the OAuth round-trip state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    OauthState,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
}

/// Payload of the `state` parameter sent to an OAuth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateClaims {
    pub nonce: Uuid,
    pub provider: AuthProvider,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}
