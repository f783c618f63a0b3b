//! Command-line interface support for Hydrogen applications
//!
//! Optional argument parsing for the flags most deployments need:
//! - `--config <path>` - Specify configuration file location
//! - `--host <host>` / `--port <port>` - Override the listen address
//! - `--help` - Show help information
//!
//! With the `cli` feature the flags are parsed by clap; without it a small
//! manual parser accepts the same flags.

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

#[cfg(feature = "cli")]
use clap::{Arg, Command};

/// CLI arguments parsed from command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to configuration file
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Whether help was requested
    pub help: bool,
}

impl CliArgs {
    /// Parse the process arguments
    pub fn parse() -> Result<Self> {
        Self::parse_from(env::args())
    }

    /// Parse command line arguments using clap (requires 'cli' feature)
    #[cfg(feature = "cli")]
    pub fn parse_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let app = Command::new("hydrogen-app")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Hydrogen web application")
            .arg(
                Arg::new("config")
                    .long("config")
                    .short('c')
                    .value_name("FILE")
                    .help("Configuration file path")
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("host")
                    .long("host")
                    .value_name("HOST")
                    .help("Address to listen on"),
            )
            .arg(
                Arg::new("port")
                    .long("port")
                    .short('p')
                    .value_name("PORT")
                    .help("Port to listen on")
                    .value_parser(clap::value_parser!(u16)),
            );

        let matches = app.try_get_matches_from(args).map_err(|e| {
            Error::config(format!("Failed to parse command line arguments: {}", e))
        })?;

        Ok(CliArgs {
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            host: matches.get_one::<String>("host").cloned(),
            port: matches.get_one::<u16>("port").copied(),
            help: false,
        })
    }

    /// Parse command line arguments using manual parsing (lightweight fallback)
    #[cfg(not(feature = "cli"))]
    pub fn parse_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::parse_simple(args)
    }

    /// Simple argument parser without clap dependency
    ///
    /// The first item is the program name. Unknown arguments are ignored.
    pub fn parse_simple<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter().map(Into::into).skip(1);

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with('-') => {
                    (flag.to_string(), Some(value.to_string()))
                }
                _ => (arg.clone(), None),
            };

            match flag.as_str() {
                "--help" | "-h" => parsed.help = true,
                "--config" | "-c" => {
                    parsed.config_file = Some(PathBuf::from(flag_value(&flag, inline, &mut args)?));
                }
                "--host" => parsed.host = Some(flag_value(&flag, inline, &mut args)?),
                "--port" | "-p" => {
                    let value = flag_value(&flag, inline, &mut args)?;
                    let port = value
                        .parse()
                        .map_err(|_| Error::config(format!("Invalid port '{}'", value)))?;
                    parsed.port = Some(port);
                }
                _ => {}
            }
        }

        Ok(parsed)
    }

    /// Print help information
    pub fn print_help() {
        let program = env::args()
            .next()
            .unwrap_or_else(|| "hydrogen-app".to_string());
        println!("Hydrogen Web Application");
        println!();
        println!("USAGE:");
        println!("    {} [OPTIONS]", program);
        println!();
        println!("OPTIONS:");
        println!("    -c, --config <FILE>    Configuration file path");
        println!("        --host <HOST>      Address to listen on");
        println!("    -p, --port <PORT>      Port to listen on");
        println!("    -h, --help             Print help information");
    }

    /// Get the configuration file path to use
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_file.as_ref()
    }

    /// Check if this is a help request
    pub fn is_help(&self) -> bool {
        self.help
    }
}

fn flag_value(
    flag: &str,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = String>,
) -> Result<String> {
    inline
        .or_else(|| rest.next())
        .ok_or_else(|| Error::config(format!("{} flag requires a value", flag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments() {
        let args = CliArgs::parse_simple(["app"]).unwrap();
        assert_eq!(args, CliArgs::default());
        assert!(args.config_path().is_none());
        assert!(!args.is_help());
    }

    #[test]
    fn test_simple_parser_flags() {
        let args = CliArgs::parse_simple([
            "app",
            "--config",
            "/etc/app.toml",
            "--host=0.0.0.0",
            "-p",
            "9000",
            "--unknown",
        ])
        .unwrap();

        assert_eq!(args.config_path(), Some(&PathBuf::from("/etc/app.toml")));
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(9000));
    }

    #[test]
    fn test_simple_parser_errors() {
        assert!(CliArgs::parse_simple(["app", "--config"]).is_err());
        assert!(matches!(
            CliArgs::parse_simple(["app", "--port", "http"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_help_flag() {
        assert!(CliArgs::parse_simple(["app", "-h"]).unwrap().is_help());
    }

    #[test]
    fn test_parse_from() {
        let args = CliArgs::parse_from(["app", "-c", "dev.toml", "--port", "8080"]).unwrap();
        assert_eq!(args.config_path(), Some(&PathBuf::from("dev.toml")));
        assert_eq!(args.port, Some(8080));
    }
}
