//! Client-side session: the single authentication token.
//!
//! # Design
//! The token is an explicit value owned by the controller instead of ambient
//! cookie storage. The cookie format is kept as a serialization so a host can
//! persist the session the way a browser would: a secure `authToken`
//! session cookie on `/` with no expiry.

use std::fmt;

use cookie::Cookie;

/// Name under which the token is stored in a cookie.
pub const COOKIE_NAME: &str = "authToken";

/// Opaque credential issued by the server on login. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Returns `None` for an empty token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Holds at most one token. Presence means authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<AuthToken>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: AuthToken) -> Self {
        Self { token: Some(token) }
    }

    /// Replaces whatever token was held before.
    pub fn store(&mut self, token: AuthToken) {
        self.token = Some(token);
    }

    pub fn clear(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// `Set-Cookie` style line for the current token, if any.
    pub fn set_cookie(&self) -> Option<String> {
        self.token.as_ref().map(|token| {
            Cookie::build((COOKIE_NAME, token.as_str()))
                .path("/")
                .secure(true)
                .build()
                .to_string()
        })
    }

    /// Line that expires the cookie immediately.
    pub fn expire_cookie() -> String {
        Cookie::build(COOKIE_NAME)
            .path("/")
            .removal()
            .build()
            .to_string()
    }

    /// Reads `authToken` out of a `name=value; name=value` header.
    ///
    /// Pairs that do not parse and attributes such as `Path` are skipped.
    /// Surrounding quotes are stripped from the value. A missing or empty
    /// value yields an unauthenticated session.
    pub fn from_cookie_header(header: &str) -> Self {
        let token = Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == COOKIE_NAME)
            .and_then(|cookie| AuthToken::new(cookie.value_trimmed()));
        Self { token }
    }
}
