//! Ordered `name=value` settings from the config file and command-line overrides.
//!
//! Both sources share one grammar: `name`, `name=value`, `noname` and
//! `noname=1` (negation), `noname=0` (double negative, same as bare `name`).
//! Override tokens carry one or two leading dashes. Declaration order is kept
//! because credential directives are order-sensitive.

use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("{origin}: invalid setting {token:?}: {reason}")]
    Syntax {
        origin: String,
        token: String,
        reason: &'static str,
    },
    #[error("{origin}: unknown setting -{name}")]
    Unknown { origin: String, name: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    ConfigFile,
    CommandLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `name` with no `=`.
    Bare,
    /// `name=value`, possibly empty.
    Set(String),
    /// `noname`.
    Negated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub name: String,
    pub value: Value,
    pub source: Source,
}

impl Setting {
    /// Parse one setting with any leading dashes already removed.
    ///
    /// # Errors
    /// Returns [`Error::Syntax`] for empty names, invalid characters or a
    /// negated setting with a value other than `0`/`1`.
    pub fn parse(raw: &str, source: Source, origin: &str) -> Result<Self> {
        let syntax = |reason| Error::Syntax {
            origin: origin.to_string(),
            token: raw.to_string(),
            reason,
        };

        let (name, value) = match raw.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (raw.trim(), None),
        };

        if name.is_empty() {
            return Err(syntax("empty name"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(syntax("name contains invalid characters"));
        }

        let (name, value) = match name.strip_prefix("no") {
            Some(stripped) if !stripped.is_empty() => match value {
                None | Some("1") => (stripped, Value::Negated),
                Some("0") => (stripped, Value::Bare),
                Some(_) => return Err(syntax("negated setting only accepts 0 or 1")),
            },
            _ => (
                name,
                value.map_or(Value::Bare, |v| Value::Set(v.to_string())),
            ),
        };

        Ok(Self {
            name: name.to_string(),
            value,
            source,
        })
    }

    /// Parse a command-line override token such as `-rpcauth=...` or `--norpcauth`.
    ///
    /// # Errors
    /// Returns [`Error::Syntax`] if the token does not start with `-` or is malformed.
    pub fn parse_override(token: &str) -> Result<Self> {
        let Some(stripped) = token
            .strip_prefix("--")
            .or_else(|| token.strip_prefix('-'))
        else {
            return Err(Error::Syntax {
                origin: "command line".to_string(),
                token: token.to_string(),
                reason: "overrides must start with '-'",
            });
        };
        Self::parse(stripped, Source::CommandLine, "command line")
    }
}

/// Settings in declaration order: config file first, then overrides.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    entries: Vec<Setting>,
}

impl Settings {
    #[must_use]
    pub fn new(mut config: Vec<Setting>, overrides: Vec<Setting>) -> Self {
        config.extend(overrides);
        Self { entries: config }
    }

    /// Parse config file contents.
    ///
    /// # Errors
    /// Returns [`Error::Syntax`] with the line number for malformed lines.
    pub fn parse_config(contents: &str, path: &Path) -> Result<Vec<Setting>> {
        let mut settings = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let origin = format!("{}:{}", path.display(), index + 1);
            settings.push(Setting::parse(line, Source::ConfigFile, &origin)?);
        }
        Ok(settings)
    }

    /// Read and parse a config file. A missing file is only an error when `required`.
    ///
    /// # Errors
    /// Returns [`Error::Read`] or [`Error::Syntax`].
    pub fn load_config(path: &Path, required: bool) -> Result<Vec<Setting>> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let settings = Self::parse_config(&contents, path)?;
                debug!("Read {} setting(s) from {}", settings.len(), path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                debug!("No config file at {}", path.display());
                Ok(Vec::new())
            }
            Err(source) => Err(Error::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse command-line override tokens.
    ///
    /// # Errors
    /// Returns the first malformed token.
    pub fn parse_overrides<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Setting>> {
        tokens
            .iter()
            .map(|t| Setting::parse_override(t.as_ref()))
            .collect()
    }

    /// Reject any setting whose name is not in `known`.
    ///
    /// # Errors
    /// Returns [`Error::Unknown`] for the first unrecognised name.
    pub fn ensure_known(&self, known: &[&str]) -> Result<()> {
        match self.entries.iter().find(|s| !known.contains(&s.name.as_str())) {
            Some(setting) => Err(Error::Unknown {
                origin: match setting.source {
                    Source::ConfigFile => "config file".to_string(),
                    Source::CommandLine => "command line".to_string(),
                },
                name: setting.name.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.entries.iter()
    }

    /// All settings named `name`, in order.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Setting> + 'a {
        self.entries.iter().filter(move |s| s.name == name)
    }

    /// The last occurrence of `name`.
    #[must_use]
    pub fn last(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| &s.value)
    }

    /// Last value as a string; bare counts as empty, negation as unset.
    #[must_use]
    pub fn get_string(&self, name: &str) -> Option<String> {
        match self.last(name)? {
            Value::Bare => Some(String::new()),
            Value::Set(v) => Some(v.clone()),
            Value::Negated => None,
        }
    }

    /// Last value as a boolean: bare and non-zero values are true, `0` and
    /// negation are false.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.last(name).map(|value| match value {
            Value::Bare => true,
            Value::Set(v) => !matches!(v.as_str(), "0" | "false"),
            Value::Negated => false,
        })
    }

    /// Non-empty values set after the last negation of `name`.
    #[must_use]
    pub fn get_list(&self, name: &str) -> Vec<String> {
        let mut values = Vec::new();
        for setting in self.named(name) {
            match &setting.value {
                Value::Negated => values.clear(),
                Value::Set(v) if !v.is_empty() => values.push(v.clone()),
                Value::Set(_) | Value::Bare => {}
            }
        }
        values
    }
}
