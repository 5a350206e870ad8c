use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::path::PathBuf;

pub const CMD_GEN: &str = "gen";
pub const ARG_USERNAME: &str = "username";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_OUTPUT: &str = "output";

#[derive(Debug, Clone)]
pub struct Options {
    pub username: String,
    pub password: Option<SecretString>,
    pub output: Option<PathBuf>,
}

impl Options {
    /// Parse `gen` arguments from the subcommand matches.
    ///
    /// # Errors
    /// Returns an error if the username is missing or invalid.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let username = matches
            .get_one::<String>(ARG_USERNAME)
            .cloned()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: <{ARG_USERNAME}>"))?;
        if username.contains(':') {
            anyhow::bail!("username must not contain ':'");
        }

        Ok(Self {
            username,
            password: matches
                .get_one::<String>(ARG_PASSWORD)
                .cloned()
                .map(SecretString::from),
            output: matches.get_one::<PathBuf>(ARG_OUTPUT).cloned(),
        })
    }
}

#[must_use]
pub fn subcommand() -> Command {
    Command::new(CMD_GEN)
        .about("Generate an rpcauth entry for a user")
        .arg(
            Arg::new(ARG_USERNAME)
                .help("Username the entry authenticates")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .help("Password to hash; a random one is generated when omitted"),
        )
        .arg(
            Arg::new(ARG_OUTPUT)
                .short('o')
                .long(ARG_OUTPUT)
                .help("Append the entry to this file, suitable for -rpcauthfile")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}
