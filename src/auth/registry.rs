//! Resolution of ordered credential directives into the effective registry.
//!
//! Directives are replayed left to right against two lists: the `active`
//! accumulator and the `baseline` captured by the most recent `Clear`.
//! `ReEnable` puts the baseline back in front of whatever was added since.

use std::{collections::HashMap, mem};
use tracing::{debug, info, warn};

use super::credential::{Credential, CredentialEntry, LegacyCredential};
use super::directive::Directive;
use super::error::Result;

#[derive(Debug, Default)]
struct Accumulator {
    active: Vec<CredentialEntry>,
    baseline: Option<Vec<CredentialEntry>>,
}

impl Accumulator {
    fn apply(&mut self, directive: &Directive) -> Result<()> {
        match directive {
            Directive::Clear => {
                debug!("Clearing {} accumulated credential(s)", self.active.len());
                self.baseline = Some(mem::take(&mut self.active));
            }
            Directive::ReEnable => {
                if let Some(mut restored) = self.baseline.take() {
                    debug!("Restoring {} cleared credential(s)", restored.len());
                    restored.append(&mut self.active);
                    self.active = restored;
                }
            }
            add => {
                // Entries are parsed even if a later Clear drops them: a
                // ReEnable could bring them back.
                self.active.extend(add.entries()?);
            }
        }
        Ok(())
    }
}

/// Replay `directives` and return the surviving entries in processing order,
/// before de-duplication.
///
/// # Errors
/// Returns the first parse error; nothing is resolved partially.
pub fn resolve(directives: &[Directive]) -> Result<Vec<CredentialEntry>> {
    let mut accumulator = Accumulator::default();
    for directive in directives {
        accumulator.apply(directive)?;
    }
    Ok(accumulator.active)
}

/// The effective, read-only mapping from username to verification material.
#[derive(Debug, Clone, Default)]
pub struct CredentialRegistry {
    credentials: HashMap<String, Credential>,
}

impl CredentialRegistry {
    /// Build the registry from the legacy pair (if any) followed by the
    /// resolved directives. The last credential seen for a username wins.
    ///
    /// # Errors
    /// Returns [`super::Error::InvalidCredentialFormat`] or one of its file
    /// variants if any directive is malformed.
    pub fn build(directives: Vec<Directive>, legacy: Option<LegacyCredential>) -> Result<Self> {
        let entries = resolve(&directives)?;

        let mut credentials = HashMap::with_capacity(entries.len() + 1);
        if let Some(legacy) = legacy {
            warn!("rpcuser/rpcpassword are deprecated, prefer rpcauth entries");
            credentials.insert(legacy.username().to_string(), Credential::Legacy(legacy));
        }

        for entry in entries {
            let username = entry.username().to_string();
            if let Some(previous) = credentials.insert(username, Credential::Hashed(entry)) {
                debug!("Credential for {} replaced by a later entry", previous.username());
            }
        }

        info!("Resolved {} RPC credential(s)", credentials.len());

        Ok(Self { credentials })
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<&Credential> {
        self.credentials.get(username)
    }

    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.credentials.contains_key(username)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.credentials.keys().map(String::as_str)
    }
}
