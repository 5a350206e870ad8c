//! Hashed `rpcauth` entries and the plaintext legacy pair.

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::verifier::keyed_hash;

/// Length in bytes of an HMAC-SHA256 digest.
pub const HASH_LEN: usize = 32;

/// Random bytes used for a freshly generated salt (hex encoded to 32 chars).
const SALT_LEN: usize = 16;

/// One salted-hash credential: `user:salt$hash`.
///
/// The salt is kept in its textual form because the textual form is the HMAC
/// key. The hash is the decoded digest.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    username: String,
    salt: String,
    hash: [u8; HASH_LEN],
}

impl CredentialEntry {
    #[must_use]
    pub const fn new(username: String, salt: String, hash: [u8; HASH_LEN]) -> Self {
        Self {
            username,
            salt,
            hash,
        }
    }

    /// Build an entry for `password` with a fresh random salt.
    #[must_use]
    pub fn generate(username: &str, password: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let hash = keyed_hash(salt.as_bytes(), password.as_bytes());
        Self::new(username.to_string(), salt, hash)
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn salt(&self) -> &[u8] {
        self.salt.as_bytes()
    }

    pub(crate) const fn hash(&self) -> &[u8; HASH_LEN] {
        &self.hash
    }

    /// Render the entry in the directive format accepted by `rpcauth=`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}${}", self.username, self.salt, hex::encode(self.hash))
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("username", &self.username)
            .field("salt", &"[REDACTED]")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

/// The deprecated `rpcuser`/`rpcpassword` pair, compared without hashing.
#[derive(Debug, Clone)]
pub struct LegacyCredential {
    username: String,
    password: SecretString,
}

impl LegacyCredential {
    #[must_use]
    pub const fn new(username: String, password: SecretString) -> Self {
        Self { username, password }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &[u8] {
        self.password.expose_secret().as_bytes()
    }
}

/// Verification material stored in the registry for one username.
#[derive(Debug, Clone)]
pub enum Credential {
    Hashed(CredentialEntry),
    Legacy(LegacyCredential),
}

impl Credential {
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Hashed(entry) => entry.username(),
            Self::Legacy(legacy) => legacy.username(),
        }
    }
}
