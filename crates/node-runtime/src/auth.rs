//! # Role Resolution
//!
//! Maps a bearer token to a [`Role`]. Resolution is a pure function of the
//! token and the [`AuthConfig`] passed in; nothing is cached between calls.

use crate::config::AuthConfig;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Public,
    Operator,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Public => "public",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

/// Role for `token`. An empty or unknown token is `Public`; a token listed
/// under both roles resolves to `Admin`.
pub fn resolve_role(token: &str, auth: &AuthConfig) -> Role {
    let token = token.trim();
    if token.is_empty() {
        return Role::Public;
    }
    if auth.admin_tokens.iter().any(|t| tokens_match(t, token)) {
        Role::Admin
    } else if auth.operator_tokens.iter().any(|t| tokens_match(t, token)) {
        Role::Operator
    } else {
        Role::Public
    }
}

/// Constant-time over the configured token's contents.
fn tokens_match(expected: &str, given: &str) -> bool {
    let lengths = expected.len().ct_eq(&given.len());
    let mut padded = vec![0u8; expected.len()];
    let n = given.len().min(expected.len());
    padded[..n].copy_from_slice(&given.as_bytes()[..n]);
    (lengths & expected.as_bytes().ct_eq(&padded)).into()
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Caller's role if it is at least `required`, otherwise the role it has.
/// With no tokens configured every caller is treated as admin.
pub fn authorize(headers: &HeaderMap, auth: &AuthConfig, required: Role) -> Result<Role, Role> {
    if auth.is_open() {
        return Ok(Role::Admin);
    }
    let role = bearer_token(headers)
        .map(|token| resolve_role(token, auth))
        .unwrap_or(Role::Public);
    if role >= required {
        Ok(role)
    } else {
        Err(role)
    }
}
