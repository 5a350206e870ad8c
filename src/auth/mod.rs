//! Multi-source RPC credential authentication.
//!
//! Credentials come from inline `rpcauth` entries, `rpcauthfile` files, the
//! legacy `rpcuser`/`rpcpassword` pair and the generated cookie. Startup
//! resolves them once into an immutable [`Authenticator`]; each request is
//! then a pure accept-or-reject decision.

pub mod config;
pub mod cookie;
pub mod credential;
pub mod directive;
pub mod error;
pub mod permissions;
pub mod registry;
pub mod verifier;
pub mod whitelist;

use base64ct::{Base64, Encoding};
use tracing::debug;

pub use self::config::{AuthOptions, CookieOptions};
pub use self::cookie::{CookieCredential, CookieProvider, CookieState, COOKIE_USERNAME};
pub use self::credential::{Credential, CredentialEntry, LegacyCredential};
pub use self::directive::Directive;
pub use self::error::{Error, Result};
pub use self::permissions::CookiePermissions;
pub use self::registry::CredentialRegistry;
pub use self::whitelist::RpcWhitelist;

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Accepted { username: String },
    Rejected,
}

impl AuthDecision {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Split an `Authorization: Basic <base64>` value into user and password.
///
/// The username ends at the first `:`; the password may contain `:`.
#[must_use]
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = Base64::decode_vec(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// The immutable credential snapshot consulted on every request.
#[derive(Debug)]
pub struct Authenticator {
    registry: CredentialRegistry,
    cookie: Option<CookieCredential>,
}

impl Authenticator {
    #[must_use]
    pub const fn new(registry: CredentialRegistry, cookie: Option<CookieCredential>) -> Self {
        Self { registry, cookie }
    }

    #[must_use]
    pub const fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    #[must_use]
    pub fn cookie(&self) -> Option<&CookieCredential> {
        self.cookie.as_ref()
    }

    /// Check a username/password pair: the cookie first, then the registry.
    #[must_use]
    pub fn check(&self, username: &str, password: &str) -> bool {
        if self
            .cookie
            .as_ref()
            .is_some_and(|cookie| cookie.verify(username, password))
        {
            return true;
        }
        verifier::verify(&self.registry, username, password)
    }

    /// Decide on a raw `Authorization` header value.
    #[must_use]
    pub fn authenticate(&self, header: Option<&str>) -> AuthDecision {
        let Some((username, password)) = header.and_then(parse_basic) else {
            debug!("Missing or malformed Authorization header");
            return AuthDecision::Rejected;
        };
        if self.check(&username, &password) {
            AuthDecision::Accepted { username }
        } else {
            debug!("Rejected RPC credentials");
            AuthDecision::Rejected
        }
    }
}
