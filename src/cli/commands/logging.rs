//! Log verbosity and output format flags.

use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_JSON: &str = "log-json";

/// Level names in the order `-v` counts through them.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// `None` keeps the subscriber default.
    pub level: Option<Level>,
    pub json: bool,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let count = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
        Self {
            level: level(count),
            json: matches.get_flag(ARG_LOG_JSON),
        }
    }
}

const fn level(count: u8) -> Option<Level> {
    match count {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Accepts either a count (`0`..=`5`) or a level name from `RPCAUTH_LOG_LEVEL`.
fn parse_level(raw: &str) -> Result<u8, String> {
    if let Ok(count) = raw.parse::<u8>() {
        if count <= 5 {
            return Ok(count);
        }
    }
    let name = raw.to_lowercase();
    LEVEL_NAMES
        .iter()
        .position(|candidate| *candidate == name)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level: {raw}"))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("RPCAUTH_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(ValueParser::from(parse_level)),
        )
        .arg(
            Arg::new(ARG_LOG_JSON)
                .long("log-json")
                .help("Emit one JSON object per log line")
                .env("RPCAUTH_LOG_JSON")
                .global(true)
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str]) -> Options {
        temp_env::with_vars(
            [
                ("RPCAUTH_LOG_LEVEL", None::<&str>),
                ("RPCAUTH_LOG_JSON", None),
            ],
            || {
                let matches = with_args(Command::new("rpcauth")).get_matches_from(args.iter().copied());
                Options::parse(&matches)
            },
        )
    }

    #[test]
    fn level_names_follow_counts() {
        assert_eq!(parse_level("error"), Ok(0));
        assert_eq!(parse_level("WARN"), Ok(1));
        assert_eq!(parse_level("info"), Ok(2));
        assert_eq!(parse_level("trace"), Ok(4));
        assert_eq!(parse_level("5"), Ok(5));
        assert!(parse_level("6").is_err());
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn counts_map_to_levels() {
        assert_eq!(level(0), None);
        assert_eq!(level(1), Some(Level::WARN));
        assert_eq!(level(3), Some(Level::DEBUG));
        assert_eq!(level(9), Some(Level::TRACE));
    }

    #[test]
    fn defaults_are_quiet_and_pretty() {
        assert_eq!(
            options(&["rpcauth"]),
            Options {
                level: None,
                json: false
            }
        );
    }

    #[test]
    fn flags() {
        assert_eq!(
            options(&["rpcauth", "-vv", "--log-json"]),
            Options {
                level: Some(Level::INFO),
                json: true
            }
        );
    }
}
