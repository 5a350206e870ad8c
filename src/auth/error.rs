//! Startup failures of the authentication layer.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Fatal startup errors of the authentication layer.
///
/// Per-request failures are never represented here; they surface only as a
/// rejected [`super::AuthDecision`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid credential format: {reason}")]
    InvalidCredentialFormat { reason: &'static str },
    #[error("invalid credential format in {path}:{line}: {reason}")]
    InvalidCredentialFileEntry {
        path: PathBuf,
        line: usize,
        reason: &'static str,
    },
    #[error("unable to read credential file {path}: {source}")]
    CredentialFile { path: PathBuf, source: io::Error },
    #[error("unable to write cookie file {path}: {source}")]
    CookieWriteFailure { path: PathBuf, source: io::Error },
    #[error("cookie file {path} has mode {actual:04o}, expected {expected:04o}")]
    CookiePermissionMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },
    #[error("invalid -rpccookieperms value {0:?}; expected an octal mode up to 7777")]
    InvalidPermissions(String),
    #[error("invalid -rpcwhitelist value: {0}")]
    InvalidWhitelist(String),
}

impl Error {
    /// Whether the error belongs to the malformed-credential class.
    #[must_use]
    pub const fn is_invalid_credential_format(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentialFormat { .. }
                | Self::InvalidCredentialFileEntry { .. }
                | Self::CredentialFile { .. }
        )
    }

    /// Whether the error belongs to the cookie provisioning class.
    #[must_use]
    pub const fn is_cookie_write_failure(&self) -> bool {
        matches!(
            self,
            Self::CookieWriteFailure { .. } | Self::CookiePermissionMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
