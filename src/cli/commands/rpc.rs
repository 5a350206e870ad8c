use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

pub const ARG_DATADIR: &str = "datadir";
pub const ARG_CONF: &str = "conf";
pub const ARG_BIND: &str = "bind";
pub const ARG_PORT: &str = "port";
pub const ARG_OVERRIDES: &str = "overrides";

/// Name of the config file looked up inside the data directory.
pub const DEFAULT_CONF_FILE: &str = "rpcauth.conf";

#[derive(Debug, Clone)]
pub struct Options {
    pub datadir: PathBuf,
    pub conf: Option<PathBuf>,
    pub addr: SocketAddr,
    pub overrides: Vec<String>,
}

impl Options {
    /// Parse server arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let datadir = matches
            .get_one::<PathBuf>(ARG_DATADIR)
            .cloned()
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_DATADIR}"))?;
        let bind = matches
            .get_one::<IpAddr>(ARG_BIND)
            .copied()
            .unwrap_or(crate::rpc::DEFAULT_BIND);
        let port = matches
            .get_one::<u16>(ARG_PORT)
            .copied()
            .unwrap_or(crate::rpc::DEFAULT_PORT);

        Ok(Self {
            datadir,
            conf: matches.get_one::<PathBuf>(ARG_CONF).cloned(),
            addr: SocketAddr::new(bind, port),
            overrides: matches
                .get_many::<String>(ARG_OVERRIDES)
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
        })
    }

    /// The config file to read and whether it must exist.
    #[must_use]
    pub fn conf_path(&self) -> (PathBuf, bool) {
        match &self.conf {
            Some(conf) if conf.is_absolute() => (conf.clone(), true),
            Some(conf) => (self.datadir.join(conf), true),
            None => (self.datadir.join(DEFAULT_CONF_FILE), false),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DATADIR)
                .long(ARG_DATADIR)
                .help("Data directory holding the cookie and relative credential files")
                .env("RPCAUTH_DATADIR")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new(ARG_CONF)
                .long(ARG_CONF)
                .help("Config file, relative paths resolve against the data directory (default: rpcauth.conf)")
                .env("RPCAUTH_CONF")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_BIND)
                .long(ARG_BIND)
                .help("Address to listen on")
                .default_value("127.0.0.1")
                .env("RPCAUTH_BIND")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new(ARG_PORT)
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8332")
                .env("RPCAUTH_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_OVERRIDES)
                .help("Setting overrides applied after the config file, e.g. -rpcauth=<entry> -norpcauth")
                .value_name("OVERRIDES")
                .action(ArgAction::Append)
                .num_args(1..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}
