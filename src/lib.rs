//! # rpcauth
//!
//! HTTP Basic authentication for a JSON-RPC listener, fed from several
//! credential sources at once.
//!
//! ## Credential sources
//!
//! - **`rpcauth=<user>:<salt>$<hash>`:** salted HMAC-SHA256 entries, where the
//!   salt string is the key and the password the message.
//! - **`rpcauthfile=<path>`:** files holding one such entry per line.
//! - **`rpcuser`/`rpcpassword`:** a single deprecated plaintext pair.
//! - **Cookie:** a fresh `__cookie__:<secret>` written to the data directory on
//!   every start and deleted on clean shutdown.
//!
//! ## Override semantics
//!
//! Settings are replayed in order, config file first and command-line
//! overrides after. `-norpcauth` clears everything accumulated so far, a bare
//! `-rpcauth` undoes the latest clear, and an empty `-rpcauth=` adds nothing.
//! A single malformed entry aborts startup before the listener binds.
//!
//! ## Requests
//!
//! Every request on `/` must carry valid Basic credentials; any failure is the
//! same bare `401`. Passwords are compared in fixed time and unknown users
//! cost the same hashing work as known ones.

pub mod auth;
pub mod cli;
pub mod rpc;
pub mod settings;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
