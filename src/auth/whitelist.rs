//! Per-user allow lists of RPC methods.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::error::{Error, Result};

/// Per-user allow lists of RPC method names.
#[derive(Debug, Clone, Default)]
pub struct RpcWhitelist {
    users: HashMap<String, HashSet<String>>,
    restrict_unlisted: bool,
}

impl RpcWhitelist {
    /// Build from `user:method,method` values. Repeated users intersect.
    ///
    /// `default` is the `rpcwhitelistdefault` setting; when unset it is on as
    /// soon as any whitelist entry exists.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWhitelist`] if a value lacks the `:` separator.
    pub fn build<S: AsRef<str>>(values: &[S], default: Option<bool>) -> Result<Self> {
        let mut users: HashMap<String, HashSet<String>> = HashMap::new();
        for value in values {
            let value = value.as_ref();
            let Some((user, methods)) = value.split_once(':') else {
                return Err(Error::InvalidWhitelist(format!(
                    "{value:?} is missing ':' between user and methods"
                )));
            };
            let methods: HashSet<String> = methods
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ToString::to_string)
                .collect();

            match users.get_mut(user) {
                Some(existing) => existing.retain(|m| methods.contains(m)),
                None => {
                    users.insert(user.to_string(), methods);
                }
            }
        }

        let restrict_unlisted = default.unwrap_or(!values.is_empty());
        debug!(
            "RPC whitelist covers {} user(s), unlisted users restricted: {}",
            users.len(),
            restrict_unlisted
        );

        Ok(Self {
            users,
            restrict_unlisted,
        })
    }

    /// Whether `user` may call `method`.
    #[must_use]
    pub fn allows(&self, user: &str, method: &str) -> bool {
        match self.users.get(user) {
            Some(methods) => methods.contains(method),
            None => !self.restrict_unlisted,
        }
    }
}
