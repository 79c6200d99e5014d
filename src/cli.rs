//! Command-line interface for session-hub.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionId;

/// What to do with the configured store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Garbage-collect every configured driver.
    Gc,
    /// List the session ids held by the file driver.
    List,
    /// Print the default driver's record for an id.
    Read(SessionId),
    /// Destroy an id on every driver.
    Destroy(SessionId),
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Session directory for the file driver.
    pub dir: Option<PathBuf>,
    /// Max session lifetime for gc, in seconds.
    pub max_lifetime: Option<u64>,
    /// Name of the default driver.
    pub default_driver: Option<String>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Command to run.
    pub command: Option<Command>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut pending: Option<&'static str> = None;
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('d') | Long("dir") => {
                result.dir = Some(parser.value()?.parse()?);
            }
            Short('m') | Long("max-lifetime") => {
                let value: String = parser.value()?.parse()?;
                result.max_lifetime = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("max-lifetime", value))?,
                );
            }
            Short('D') | Long("default-driver") => {
                result.default_driver = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                let val = val.string()?;
                if let Some(command) = pending.take() {
                    let id: SessionId = val
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("id", val.clone()))?;
                    result.command = Some(match command {
                        "read" => Command::Read(id),
                        _ => Command::Destroy(id),
                    });
                    continue;
                }
                if result.command.is_some() {
                    return Err(ArgsError::UnexpectedArgument(val));
                }
                match val.as_str() {
                    "gc" => result.command = Some(Command::Gc),
                    "list" => result.command = Some(Command::List),
                    "read" => pending = Some("read"),
                    "destroy" => pending = Some("destroy"),
                    _ => return Err(ArgsError::UnknownCommand(val)),
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if let Some(command) = pending {
        return Err(ArgsError::MissingId(command));
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"session-hub {version}
Inspect and maintain a multi-driver session store

USAGE:
    session-hub [OPTIONS] <COMMAND>

COMMANDS:
    gc                      Remove expired sessions from every driver
    list                    List session ids in the file driver
    read <ID>               Print the default driver's record for ID
    destroy <ID>            Destroy ID on every driver

OPTIONS:
    -c, --config <FILE>         Path to configuration file (JSON)
    -d, --dir <DIR>             Session directory for the file driver
    -m, --max-lifetime <SECS>   Max session lifetime for gc [default: 86400]
    -D, --default-driver <NAME> Default driver [default: file]
    -l, --log-level <LVL>       Log level (error, warn, info, debug, trace)
    -h, --help                  Print help
    -V, --version               Print version

ENVIRONMENT VARIABLES:
    SESSION_HUB_DIR             Session directory (overrides config)
    SESSION_HUB_DEFAULT_DRIVER  Default driver (overrides config)
    SESSION_HUB_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                    Alternative log level setting

NOTES:
    The cache driver is an in-process memory cache. Each run starts with
    an empty one, so gc, read and destroy only reach records stored by
    the file driver.

EXAMPLES:
    # Sweep sessions idle for more than an hour
    session-hub -d /var/lib/app/sessions -m 3600 gc

    # Inspect one session
    session-hub -c /etc/session-hub.json read 3f2a9c
"#
    )
}

/// Print version.
pub fn print_version() {
    println!("session-hub {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// Lexopt parsing error.
    #[error("{0}")]
    Lexopt(#[from] lexopt::Error),
    /// Invalid argument value.
    #[error("invalid value for --{0}: '{1}'")]
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    #[error("unexpected argument: '{0}'")]
    UnexpectedArgument(String),
    /// Unknown command name.
    #[error("unknown command: '{0}'")]
    UnknownCommand(String),
    /// Command needs a session id.
    #[error("'{0}' needs a session id")]
    MissingId(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("session-hub")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.command.is_none());
        assert!(result.config.is_none());
        assert!(result.max_lifetime.is_none());
    }

    #[test]
    fn test_gc_with_options() {
        let result = parse_args_from(args(&["-d", "/tmp/s", "-m", "3600", "gc"])).unwrap();
        assert_eq!(result.dir, Some(PathBuf::from("/tmp/s")));
        assert_eq!(result.max_lifetime, Some(3600));
        assert_eq!(result.command, Some(Command::Gc));
    }

    #[test]
    fn test_long_options() {
        let result = parse_args_from(args(&[
            "--config",
            "/etc/hub.json",
            "--default-driver",
            "cache",
            "--log-level",
            "debug",
            "list",
        ]))
        .unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/hub.json")));
        assert_eq!(result.default_driver, Some("cache".to_string()));
        assert_eq!(result.log_level, Some("debug".to_string()));
        assert_eq!(result.command, Some(Command::List));
    }

    #[test]
    fn test_read_and_destroy() {
        let result = parse_args_from(args(&["read", "abc123"])).unwrap();
        assert_eq!(result.command, Some(Command::Read("abc123".parse().unwrap())));

        let result = parse_args_from(args(&["destroy", "abc123"])).unwrap();
        assert_eq!(
            result.command,
            Some(Command::Destroy("abc123".parse().unwrap()))
        );
    }

    #[test]
    fn test_missing_id() {
        assert!(matches!(
            parse_args_from(args(&["read"])),
            Err(ArgsError::MissingId("read"))
        ));
    }

    #[test]
    fn test_invalid_id() {
        assert!(parse_args_from(args(&["destroy", "../x"])).is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            parse_args_from(args(&["explode"])),
            Err(ArgsError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_extra_positional() {
        assert!(matches!(
            parse_args_from(args(&["gc", "list"])),
            Err(ArgsError::UnexpectedArgument(_))
        ));
    }

    #[test]
    fn test_invalid_max_lifetime() {
        assert!(parse_args_from(args(&["-m", "soon"])).is_err());
    }

    #[test]
    fn test_help_mentions_in_process_cache() {
        let help = help_text();
        assert!(help.contains("in-process memory cache"));
        assert!(help.contains("destroy <ID>"));
    }

    #[test]
    fn test_help_and_version_flags() {
        assert!(parse_args_from(args(&["-h"])).unwrap().help);
        assert!(parse_args_from(args(&["--help"])).unwrap().help);
        assert!(parse_args_from(args(&["-V"])).unwrap().version);
        assert!(parse_args_from(args(&["--version"])).unwrap().version);
    }
}
