//! Credential directives and the `user:salt$hash` entry parser.

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::credential::{CredentialEntry, HASH_LEN};
use super::error::{Error, Result};

/// One credential configuration instruction, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A single `user:salt$hash` entry. An empty value is a no-op.
    AddInline(String),
    /// A file holding zero or more entries, one per line. An empty path is a no-op.
    AddFile(PathBuf),
    /// Discard everything accumulated so far, keeping it as a restore point.
    Clear,
    /// Undo the most recent [`Directive::Clear`].
    ReEnable,
}

impl Directive {
    /// Whether the directive carries an empty value and therefore adds nothing.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::AddInline(raw) => raw.trim().is_empty(),
            Self::AddFile(path) => path.as_os_str().is_empty(),
            Self::Clear | Self::ReEnable => false,
        }
    }

    /// Parse the entries this directive contributes.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCredentialFormat`] (or its file variants) when an
    /// entry is malformed or a credential file cannot be read.
    pub fn entries(&self) -> Result<Vec<CredentialEntry>> {
        if self.is_blank() {
            return Ok(Vec::new());
        }
        match self {
            Self::AddInline(raw) => parse_entry(raw).map(|entry| vec![entry]),
            Self::AddFile(path) => parse_file(path),
            Self::Clear | Self::ReEnable => Ok(Vec::new()),
        }
    }
}

/// Parse a single `user:salt$hash` entry.
///
/// The salt may be empty; username and hash may not. The hash must be the hex
/// encoding of an HMAC-SHA256 digest.
///
/// # Errors
/// Returns [`Error::InvalidCredentialFormat`] describing the first problem found.
pub fn parse_entry(raw: &str) -> Result<CredentialEntry> {
    let invalid = |reason| Error::InvalidCredentialFormat { reason };

    let mut fields = raw.split(':');
    let (Some(username), Some(material), None) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid("expected exactly one ':' separating user and salt$hash"));
    };

    let mut parts = material.split('$');
    let (Some(salt), Some(hash), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid("expected exactly one '$' separating salt and hash"));
    };

    if username.is_empty() {
        return Err(invalid("empty username"));
    }
    if hash.is_empty() {
        return Err(invalid("empty hash"));
    }

    let mut digest = [0u8; HASH_LEN];
    hex::decode_to_slice(hash, &mut digest)
        .map_err(|_| invalid("hash must be 64 hex characters"))?;

    Ok(CredentialEntry::new(
        username.to_string(),
        salt.to_string(),
        digest,
    ))
}

/// Parse every non-blank line of a credential file.
///
/// # Errors
/// Returns [`Error::CredentialFile`] if the file cannot be read and
/// [`Error::InvalidCredentialFileEntry`] on the first malformed line.
pub fn parse_file(path: &Path) -> Result<Vec<CredentialEntry>> {
    let contents = fs::read_to_string(path).map_err(|source| Error::CredentialFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry = parse_entry(line).map_err(|err| match err {
            Error::InvalidCredentialFormat { reason } => Error::InvalidCredentialFileEntry {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            },
            other => other,
        })?;
        entries.push(entry);
    }

    debug!(
        "Loaded {} credential(s) from {}",
        entries.len(),
        path.display()
    );

    Ok(entries)
}
