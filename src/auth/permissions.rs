//! Cookie file permission policy and the platform capability that applies it.

use std::{fs, io, path::Path};

use super::error::{Error, Result};

/// Owner read + owner write, nothing for group or other.
pub const DEFAULT_COOKIE_MODE: u32 = 0o600;

/// Highest mode accepted from configuration (setuid/setgid/sticky + rwx).
const MAX_MODE: u32 = 0o7777;

/// How the cookie file's permission bits are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookiePermissions {
    /// [`DEFAULT_COOKIE_MODE`].
    #[default]
    OwnerOnly,
    /// Leave the bits the OS assigned at creation (umask applies).
    OsDefault,
    /// Exactly this mode.
    Mode(u32),
}

impl CookiePermissions {
    /// Interpret an `rpccookieperms` value.
    ///
    /// An empty value or `1` selects the owner-only default, `0` selects the
    /// OS default, anything else must be an octal mode no larger than `7777`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPermissions`] for non-octal or out-of-range values.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "" | "1" => Ok(Self::OwnerOnly),
            "0" => Ok(Self::OsDefault),
            octal => match u32::from_str_radix(octal, 8) {
                Ok(mode) if mode <= MAX_MODE => Ok(Self::Mode(mode)),
                _ => Err(Error::InvalidPermissions(value.to_string())),
            },
        }
    }

    /// The mode to enforce, or `None` to keep the OS-assigned bits.
    #[must_use]
    pub const fn target_mode(self) -> Option<u32> {
        match self {
            Self::OwnerOnly => Some(DEFAULT_COOKIE_MODE),
            Self::OsDefault => None,
            Self::Mode(mode) => Some(mode),
        }
    }
}

/// Capability for setting and reading permission bits on a file.
pub trait FilePermissions: Send + Sync {
    /// Apply `mode` to `path`.
    ///
    /// # Errors
    /// Propagates the underlying filesystem error.
    fn apply(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Current mode bits of `path`, or `None` where the platform has no such concept.
    ///
    /// # Errors
    /// Propagates the underlying filesystem error.
    fn mode(&self, path: &Path) -> io::Result<Option<u32>>;
}

/// POSIX mode bits, applied with `chmod`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixPermissions;

#[cfg(unix)]
impl FilePermissions for PosixPermissions {
    fn apply(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    fn mode(&self, path: &Path) -> io::Result<Option<u32>> {
        use std::os::unix::fs::PermissionsExt;
        Ok(Some(fs::metadata(path)?.permissions().mode() & MAX_MODE))
    }
}

/// Best-effort fallback for platforms without POSIX mode bits: a mode with no
/// write bit marks the file read-only, every other bit is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOnlyFallback;

impl FilePermissions for ReadOnlyFallback {
    fn apply(&self, path: &Path, mode: u32) -> io::Result<()> {
        tracing::warn!(
            "POSIX permission bits are not supported here; {mode:04o} is approximated by the read-only flag"
        );
        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_readonly(mode & 0o222 == 0);
        fs::set_permissions(path, permissions)
    }

    fn mode(&self, _path: &Path) -> io::Result<Option<u32>> {
        Ok(None)
    }
}

/// The capability for the current platform.
#[must_use]
pub fn platform() -> &'static dyn FilePermissions {
    #[cfg(unix)]
    {
        &PosixPermissions
    }
    #[cfg(not(unix))]
    {
        &ReadOnlyFallback
    }
}
