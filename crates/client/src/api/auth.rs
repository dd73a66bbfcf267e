//! Bearer credentials.

use secrecy::{ExposeSecret, SecretString};

/// Opaque bearer token issued by `POST /api/login`.
///
/// The token is attached to individual requests by the caller; nothing in
/// the client keeps a process-wide authorization header.
#[derive(Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    /// Wrap a raw token. Returns `None` for an empty or blank string, which
    /// means "not authenticated".
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(SecretString::from(raw)))
        }
    }

    /// The raw token, for the `Authorization` header or durable storage.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_is_none() {
        assert!(BearerToken::new("").is_none());
        assert!(BearerToken::new("   ").is_none());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = BearerToken::new("eyJhbGciOi.secret").expect("non-empty");
        assert_eq!(token.expose(), "eyJhbGciOi.secret");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
