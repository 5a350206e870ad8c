//! The auto-generated cookie credential.
//!
//! A fresh secret is written on every start to `<path>.tmp`, given its
//! permission bits, and renamed into place. Failure at any step is fatal for
//! startup. The file is removed again on clean shutdown.

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

use super::error::{Error, Result};
use super::permissions::{platform, CookiePermissions, FilePermissions};
use super::verifier::{ct_eq, verify_plaintext};

/// Username presented by cookie-based clients.
pub const COOKIE_USERNAME: &str = "__cookie__";

/// Default cookie file name inside the data directory.
pub const COOKIE_FILE_NAME: &str = ".cookie";

const SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieState {
    Uninitialized,
    Generating,
    Written,
    Active,
    FailedFatal,
}

/// The generated credential, valid until the process stops.
#[derive(Debug)]
pub struct CookieCredential {
    secret: SecretString,
    path: PathBuf,
}

impl CookieCredential {
    #[must_use]
    pub const fn username(&self) -> &'static str {
        COOKIE_USERNAME
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check presented credentials against the cookie in fixed time.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = ct_eq(username.as_bytes(), COOKIE_USERNAME.as_bytes());
        let password_ok = verify_plaintext(
            password.as_bytes(),
            self.secret.expose_secret().as_bytes(),
        );
        user_ok & password_ok
    }

    /// Delete the cookie file. Missing files are not an error.
    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed cookie file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Unable to remove cookie file {}: {e}", self.path.display()),
        }
    }
}

/// Generates and persists the cookie credential.
pub struct CookieProvider {
    path: PathBuf,
    permissions: CookiePermissions,
    capability: &'static dyn FilePermissions,
    state: CookieState,
}

impl std::fmt::Debug for CookieProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieProvider")
            .field("path", &self.path)
            .field("permissions", &self.permissions)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl CookieProvider {
    #[must_use]
    pub fn new(path: PathBuf, permissions: CookiePermissions) -> Self {
        Self {
            path,
            permissions,
            capability: platform(),
            state: CookieState::Uninitialized,
        }
    }

    #[must_use]
    pub fn with_capability(mut self, capability: &'static dyn FilePermissions) -> Self {
        self.capability = capability;
        self
    }

    #[must_use]
    pub const fn state(&self) -> CookieState {
        self.state
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generate a secret and write it to disk.
    ///
    /// # Errors
    /// Returns [`Error::CookieWriteFailure`] if the file cannot be created,
    /// written or renamed, and [`Error::CookiePermissionMismatch`] if the
    /// resulting bits differ from the configured ones.
    pub fn provision(&mut self) -> Result<CookieCredential> {
        self.state = CookieState::Generating;
        let mut bytes = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        let secret = SecretString::from(hex::encode(bytes));

        let result = self.write(&secret).and_then(|()| {
            self.state = CookieState::Written;
            self.check_mode()
        });

        match result {
            Ok(()) => {
                self.state = CookieState::Active;
                info!("Generated RPC authentication cookie {}", self.path.display());
                Ok(CookieCredential {
                    secret,
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                self.state = CookieState::FailedFatal;
                error!("Unable to provision RPC authentication cookie: {e}");
                Err(e)
            }
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn write(&self, secret: &SecretString) -> Result<()> {
        let tmp = self.temp_path();
        let fail = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| Error::CookieWriteFailure { path, source }
        };

        // A stale read-only leftover would refuse to open for writing.
        if tmp.is_file() {
            fs::remove_file(&tmp).map_err(fail(&tmp))?;
        }

        if let Err(source) = self.write_temp(&tmp, secret) {
            if tmp.is_file() {
                let _ = fs::remove_file(&tmp);
            }
            return Err(fail(&tmp)(source));
        }

        if let Err(source) = fs::rename(&tmp, &self.path) {
            if let Err(e) = fs::remove_file(&tmp) {
                warn!("Unable to remove {}: {e}", tmp.display());
            }
            return Err(fail(&self.path)(source));
        }
        Ok(())
    }

    fn write_temp(&self, tmp: &Path, secret: &SecretString) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        // The secret must never sit in a file readable by group or other.
        #[cfg(unix)]
        if self.permissions.target_mode().is_some() {
            use super::permissions::DEFAULT_COOKIE_MODE;
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(DEFAULT_COOKIE_MODE);
        }
        let mut file = options.open(tmp)?;
        file.write_all(COOKIE_USERNAME.as_bytes())?;
        file.write_all(b":")?;
        file.write_all(secret.expose_secret().as_bytes())?;
        file.sync_all()?;
        if let Some(mode) = self.permissions.target_mode() {
            self.capability.apply(tmp, mode)?;
        }
        Ok(())
    }

    fn check_mode(&self) -> Result<()> {
        let Some(expected) = self.permissions.target_mode() else {
            return Ok(());
        };
        let actual = self.capability.mode(&self.path).map_err(|source| {
            Error::CookieWriteFailure {
                path: self.path.clone(),
                source,
            }
        })?;
        match actual {
            Some(actual) if actual != expected => Err(Error::CookiePermissionMismatch {
                path: self.path.clone(),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }
}
