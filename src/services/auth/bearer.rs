//! `Authorization: Bearer <uuid>` parsing.
//!
//! The scheme must be an exact prefix. Values that merely contain "Bearer" somewhere are
//! rejected, and so is anything after the scheme that is not a hyphenated UUID.

use axum::http::{HeaderMap, header};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

const SCHEME: &str = "Bearer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("authorization header is not of the form `Bearer <uuid>`")]
    MalformedToken,
}

/// A token that passed format validation.
///
/// Keeps the exact text the client sent (it is forwarded verbatim to introspection).
/// Debug never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    raw: String,
    uuid: Uuid,
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken").finish_non_exhaustive()
    }
}

impl BearerToken {
    pub fn parse(raw: &str) -> Result<Self, HeaderError> {
        if !is_canonical_uuid(raw) {
            return Err(HeaderError::MalformedToken);
        }
        let uuid = Uuid::parse_str(raw).map_err(|_| HeaderError::MalformedToken)?;

        Ok(Self {
            raw: raw.to_string(),
            uuid,
        })
    }

    /// The all-zero sentinel accepted in test mode.
    pub fn nil() -> Self {
        Self {
            raw: Uuid::nil().hyphenated().to_string(),
            uuid: Uuid::nil(),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.uuid.is_nil()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// 8-4-4-4-12 hex digits. `Uuid::parse_str` alone would also take the simple, braced and urn forms.
fn is_canonical_uuid(s: &str) -> bool {
    s.len() == 36
        && s.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

/// Extract the bearer token from the request headers.
pub fn parse_bearer_token(headers: &HeaderMap) -> Result<BearerToken, HeaderError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(HeaderError::MissingHeader)?
        .to_str()
        .map_err(|_| HeaderError::MalformedToken)?;

    let rest = value
        .strip_prefix(SCHEME)
        .ok_or(HeaderError::MalformedToken)?;

    // the scheme must be followed by at least one whitespace character
    let token = rest.trim_start();
    if token.len() == rest.len() {
        return Err(HeaderError::MalformedToken);
    }

    BearerToken::parse(token)
}
