//! Constant-time password verification.
//!
//! Every lookup outcome (hashed entry, legacy entry, unknown user) performs
//! HMAC-SHA256 work and a fixed-time comparison, so response timing does not
//! reveal whether a username exists.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::hint::black_box;
use subtle::ConstantTimeEq;

use super::credential::{Credential, CredentialEntry, HASH_LEN};
use super::registry::CredentialRegistry;

type HmacSha256 = Hmac<Sha256>;

/// Key used for decoy work and for digesting plaintext comparisons.
const DECOY_KEY: &[u8] = b"rpcauth-decoy-0c6f1e6a2d4b";

fn new_mac(key: &[u8]) -> HmacSha256 {
    match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    }
}

/// HMAC-SHA256 of `password` keyed by `salt`.
#[must_use]
pub fn keyed_hash(salt: &[u8], password: &[u8]) -> [u8; HASH_LEN] {
    let mut mac = new_mac(salt);
    mac.update(password);
    let mut digest = [0u8; HASH_LEN];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    digest
}

/// Fixed-time equality of two byte slices; only the length may leak.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).into()
}

/// Decide whether `password` is valid for `username` in `registry`.
#[must_use]
pub fn verify(registry: &CredentialRegistry, username: &str, password: &str) -> bool {
    match registry.get(username) {
        Some(Credential::Hashed(entry)) => verify_hashed(entry, password.as_bytes()),
        Some(Credential::Legacy(legacy)) => verify_plaintext(password.as_bytes(), legacy.password()),
        None => {
            decoy(password.as_bytes());
            false
        }
    }
}

/// Compare a presented secret against a stored plaintext one without leaking
/// either length or content through timing.
#[must_use]
pub fn verify_plaintext(presented: &[u8], stored: &[u8]) -> bool {
    let presented = keyed_hash(DECOY_KEY, presented);
    let stored = keyed_hash(DECOY_KEY, stored);
    presented.ct_eq(&stored).into()
}

fn verify_hashed(entry: &CredentialEntry, password: &[u8]) -> bool {
    let mut mac = new_mac(entry.salt());
    mac.update(password);
    mac.verify_slice(entry.hash()).is_ok()
}

fn decoy(password: &[u8]) {
    let digest = keyed_hash(DECOY_KEY, password);
    let reference = [0u8; HASH_LEN];
    black_box(bool::from(digest.ct_eq(&reference)));
}
