//! Platform Authentication
//!
//! Caller credentials are a (user, token) pair. Depending on the engine's
//! [`AuthScheme`] they become an HTTP basic-auth credential, a pair of
//! custom headers, or nothing at all.

use crate::resource::AuthScheme;
use std::fmt;

/// Header carrying the user name for header-token engines
pub const AUTH_USER_HEADER: &str = "X-Auth-User";
/// Header carrying the API token for header-token engines
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Caller-supplied user/token pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }

    /// Build credentials only when both halves are present and non-empty
    pub fn from_parts(user: Option<&str>, token: Option<&str>) -> Option<Self> {
        match (user, token) {
            (Some(user), Some(token)) if !user.is_empty() && !token.is_empty() => {
                Some(Self::new(user, token))
            }
            _ => None,
        }
    }

    /// Headers to inject for the given scheme (empty unless header-token)
    pub fn headers_for(&self, scheme: AuthScheme) -> Vec<(&'static str, String)> {
        match scheme {
            AuthScheme::HeaderToken => vec![
                (AUTH_USER_HEADER, self.user.clone()),
                (AUTH_TOKEN_HEADER, self.token.clone()),
            ],
            AuthScheme::Basic | AuthScheme::None => Vec::new(),
        }
    }
}

// Security: never print the token
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Credential attached to the HTTP request itself
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    Basic { username: String, password: String },
}

impl HttpAuth {
    /// Wrap credentials for the given scheme; only basic-auth engines get one
    pub fn for_scheme(scheme: AuthScheme, credentials: Option<&Credentials>) -> Option<Self> {
        match (scheme, credentials) {
            (AuthScheme::Basic, Some(credentials)) => Some(HttpAuth::Basic {
                username: credentials.user.clone(),
                password: credentials.token.clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
