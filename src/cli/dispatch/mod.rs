//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary executes: serving the
//! authenticated listener or generating a credential entry.

use crate::cli::actions::{gen, server, Action};
use crate::cli::commands::{gen::CMD_GEN, gen::Options as GenOptions, rpc};
use anyhow::Result;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some((CMD_GEN, sub)) = matches.subcommand() {
        let options = GenOptions::parse(sub)?;
        return Ok(Action::Gen(gen::Args {
            username: options.username,
            password: options.password,
            output: options.output,
        }));
    }

    let options = rpc::Options::parse(matches)?;
    let (conf, conf_required) = options.conf_path();

    Ok(Action::Server(server::Args {
        datadir: options.datadir,
        conf,
        conf_required,
        addr: options.addr,
        overrides: options.overrides,
    }))
}
