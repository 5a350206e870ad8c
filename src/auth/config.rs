//! Mapping from ordered settings to authentication inputs.

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::cookie::COOKIE_FILE_NAME;
use super::credential::LegacyCredential;
use super::directive::Directive;
use super::error::Result;
use super::permissions::CookiePermissions;
use super::whitelist::RpcWhitelist;
use crate::settings::{Settings, Value};

/// Every setting name understood by the server.
pub const KNOWN_SETTINGS: &[&str] = &[
    "rpcauth",
    "rpcauthfile",
    "rpcuser",
    "rpcpassword",
    "rpccookiefile",
    "rpccookieperms",
    "rpcwhitelist",
    "rpcwhitelistdefault",
];

/// Where and how the cookie is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: PathBuf,
    pub permissions: CookiePermissions,
}

/// Everything the server needs to build its [`super::Authenticator`].
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub directives: Vec<Directive>,
    pub legacy: Option<LegacyCredential>,
    pub cookie: Option<CookieOptions>,
    pub whitelist: RpcWhitelist,
}

impl AuthOptions {
    /// Interpret `settings`, resolving relative paths against `datadir`.
    ///
    /// Credential directives are only collected here; they are parsed when the
    /// registry is built.
    ///
    /// # Errors
    /// Returns [`super::Error::InvalidPermissions`] or
    /// [`super::Error::InvalidWhitelist`].
    pub fn from_settings(settings: &Settings, datadir: &Path) -> Result<Self> {
        let directives = directives(settings, datadir);
        let legacy = legacy(settings);

        // A configured plaintext password replaces the cookie.
        let cookie = if legacy.is_some() {
            None
        } else {
            cookie_path(settings, datadir)
                .map(|path| {
                    Ok::<_, super::Error>(CookieOptions {
                        path,
                        permissions: cookie_permissions(settings)?,
                    })
                })
                .transpose()?
        };

        let whitelist = RpcWhitelist::build(
            &settings.get_list("rpcwhitelist"),
            settings.get_bool("rpcwhitelistdefault"),
        )?;

        debug!(
            "Collected {} credential directive(s), legacy pair: {}, cookie: {}",
            directives.len(),
            legacy.is_some(),
            cookie.is_some()
        );

        Ok(Self {
            directives,
            legacy,
            cookie,
            whitelist,
        })
    }
}

fn resolve_path(datadir: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        datadir.join(path)
    }
}

/// The `rpcauth` and `rpcauthfile` settings as directives, in declaration order.
#[must_use]
pub fn directives(settings: &Settings, datadir: &Path) -> Vec<Directive> {
    settings
        .iter()
        .filter_map(|setting| {
            let directive = match (setting.name.as_str(), &setting.value) {
                ("rpcauth" | "rpcauthfile", Value::Negated) => Directive::Clear,
                ("rpcauth" | "rpcauthfile", Value::Bare) => Directive::ReEnable,
                ("rpcauth", Value::Set(entry)) => Directive::AddInline(entry.clone()),
                ("rpcauthfile", Value::Set(path)) if path.is_empty() => {
                    Directive::AddFile(PathBuf::new())
                }
                ("rpcauthfile", Value::Set(path)) => {
                    Directive::AddFile(resolve_path(datadir, path))
                }
                _ => return None,
            };
            Some(directive)
        })
        .collect()
}

fn legacy(settings: &Settings) -> Option<LegacyCredential> {
    let password = settings.get_string("rpcpassword").filter(|p| !p.is_empty())?;
    let username = settings.get_string("rpcuser").unwrap_or_default();
    Some(LegacyCredential::new(username, SecretString::from(password)))
}

fn cookie_path(settings: &Settings, datadir: &Path) -> Option<PathBuf> {
    match settings.last("rpccookiefile") {
        Some(Value::Negated) => None,
        Some(Value::Set(path)) if !path.is_empty() => Some(resolve_path(datadir, path)),
        _ => Some(datadir.join(COOKIE_FILE_NAME)),
    }
}

/// Resolve `rpccookieperms`; the last occurrence decides.
///
/// # Errors
/// Returns [`super::Error::InvalidPermissions`] for a malformed mode.
pub fn cookie_permissions(settings: &Settings) -> Result<CookiePermissions> {
    match settings.last("rpccookieperms") {
        None | Some(Value::Bare) => Ok(CookiePermissions::OwnerOnly),
        Some(Value::Negated) => Ok(CookiePermissions::OsDefault),
        Some(Value::Set(value)) => CookiePermissions::parse(value),
    }
}
