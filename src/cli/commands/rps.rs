use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_RPS_HOST: &str = "rps-host";
pub const ARG_RPS_SCHEMA: &str = "rps-schema";
pub const ARG_CA_CERT: &str = "ca-cert";

#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub schema: String,
    pub ca_cert: Option<PathBuf>,
}

impl Options {
    /// Parse RPS arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the host or schema is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            host: read_required(ARG_RPS_HOST)?,
            schema: read_required(ARG_RPS_SCHEMA)?,
            ca_cert: matches.get_one::<PathBuf>(ARG_CA_CERT).cloned(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RPS_HOST)
                .long(ARG_RPS_HOST)
                .help("RPS host and port")
                .env("RPA_RPS_HOST")
                .default_value("127.0.0.1:8011"),
        )
        .arg(
            Arg::new(ARG_RPS_SCHEMA)
                .long(ARG_RPS_SCHEMA)
                .help("RPS URL scheme")
                .env("RPA_RPS_SCHEMA")
                .default_value("http")
                .value_parser(["http", "https"]),
        )
        .arg(
            Arg::new(ARG_CA_CERT)
                .long(ARG_CA_CERT)
                .help("CA bundle (PEM) trusted for the RPS and LDAPS; replaces the built-in roots")
                .env("RPA_CA_CERT")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}
