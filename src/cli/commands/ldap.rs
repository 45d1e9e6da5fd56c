use crate::directory::LdapSettings;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_LDAP_VERIFY: &str = "ldap-verify";
pub const ARG_LDAP_VERIFY_SHOW: &str = "ldap-verify-show";
pub const ARG_LDAP_SERVER: &str = "ldap-server";
pub const ARG_LDAP_PORT: &str = "ldap-port";
pub const ARG_LDAP_DN: &str = "ldap-dn";
pub const ARG_LDAP_PASSWORD: &str = "ldap-password";
pub const ARG_LDAP_BASEDN: &str = "ldap-basedn";
pub const ARG_LDAP_FILTER: &str = "ldap-filter";
pub const ARG_LDAP_USE_TLS: &str = "ldap-use-tls";

#[derive(Debug)]
pub struct Options {
    /// Directory settings, present only when verification is enabled.
    pub settings: Option<LdapSettings>,
    pub show_errors: bool,
}

impl Options {
    /// Parse LDAP arguments from matches.
    ///
    /// # Errors
    /// Returns an error if verification is enabled without a server or base DN.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let show_errors = matches.get_flag(ARG_LDAP_VERIFY_SHOW);
        if !matches.get_flag(ARG_LDAP_VERIFY) {
            return Ok(Self {
                settings: None,
                show_errors,
            });
        }

        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let read_optional =
            |id: &str| -> String { matches.get_one::<String>(id).cloned().unwrap_or_default() };

        Ok(Self {
            settings: Some(LdapSettings {
                server: read_required(ARG_LDAP_SERVER)?,
                port: matches.get_one::<u16>(ARG_LDAP_PORT).copied().unwrap_or(389),
                use_tls: matches.get_flag(ARG_LDAP_USE_TLS),
                bind_dn: read_optional(ARG_LDAP_DN),
                bind_password: SecretString::from(read_optional(ARG_LDAP_PASSWORD)),
                base_dn: read_required(ARG_LDAP_BASEDN)?,
                filter: read_required(ARG_LDAP_FILTER)?,
            }),
            show_errors,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LDAP_VERIFY)
                .long(ARG_LDAP_VERIFY)
                .help("Check that the user exists in LDAP before sending activation mail")
                .env("RPA_LDAP_VERIFY")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_LDAP_VERIFY_SHOW)
                .long(ARG_LDAP_VERIFY_SHOW)
                .help("Reject unknown users instead of silently accepting them")
                .env("RPA_LDAP_VERIFY_SHOW")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_LDAP_SERVER)
                .long(ARG_LDAP_SERVER)
                .help("LDAP server host")
                .env("RPA_LDAP_SERVER"),
        )
        .arg(
            Arg::new(ARG_LDAP_PORT)
                .long(ARG_LDAP_PORT)
                .help("LDAP server port")
                .env("RPA_LDAP_PORT")
                .default_value("389")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_LDAP_DN)
                .long(ARG_LDAP_DN)
                .help("Bind DN")
                .env("RPA_LDAP_DN"),
        )
        .arg(
            Arg::new(ARG_LDAP_PASSWORD)
                .long(ARG_LDAP_PASSWORD)
                .help("Bind password")
                .env("RPA_LDAP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_LDAP_BASEDN)
                .long(ARG_LDAP_BASEDN)
                .help("Search base DN")
                .env("RPA_LDAP_BASEDN"),
        )
        .arg(
            Arg::new(ARG_LDAP_FILTER)
                .long(ARG_LDAP_FILTER)
                .help("Search filter, %s is replaced by the user id")
                .env("RPA_LDAP_FILTER")
                .default_value("(uid=%s)"),
        )
        .arg(
            Arg::new(ARG_LDAP_USE_TLS)
                .long(ARG_LDAP_USE_TLS)
                .help("Connect with ldaps://")
                .env("RPA_LDAP_USE_TLS")
                .action(ArgAction::SetTrue),
        )
}
