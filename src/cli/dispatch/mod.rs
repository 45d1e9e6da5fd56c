//! Map validated CLI arguments to an action.

use crate::{
    api::config::Config,
    cli::{
        actions::{server::Args, Action},
        commands::{
            ldap, rps, smtp, ARG_ADDRESS, ARG_CLIENT_SETTINGS_URL, ARG_FORCE_ACTIVATE,
            ARG_MOBILE_APP_FULL_URL, ARG_PINPAD_URL, ARG_PORT, ARG_REQUEST_OTP,
            ARG_SECURE_COOKIE, ARG_SESSION_COOKIE, ARG_SESSION_TTL, ARG_STATIC_URL_BASE,
            ARG_TEMPLATES_PATH, ARG_VERIFY_IDENTITY_URL,
        },
    },
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::{net::IpAddr, path::PathBuf};

fn read_string(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

fn config(matches: &ArgMatches, show_directory_errors: bool) -> Result<Config> {
    Ok(Config::new()
        .with_force_activate(matches.get_flag(ARG_FORCE_ACTIVATE))
        .with_request_otp(matches.get_flag(ARG_REQUEST_OTP))
        .with_verify_identity_url(read_string(matches, ARG_VERIFY_IDENTITY_URL)?)
        .with_show_directory_errors(show_directory_errors)
        .with_secure_cookie(matches.get_flag(ARG_SECURE_COOKIE))
        .with_session_cookie(read_string(matches, ARG_SESSION_COOKIE)?)
        .with_session_ttl_seconds(
            matches
                .get_one::<i64>(ARG_SESSION_TTL)
                .copied()
                .context("missing required argument: --session-ttl")?,
        )
        .with_static_url_base(read_string(matches, ARG_STATIC_URL_BASE)?)
        .with_pinpad_url(read_string(matches, ARG_PINPAD_URL)?)
        .with_client_settings_url(read_string(matches, ARG_CLIENT_SETTINGS_URL)?)
        .with_mobile_app_full_url(read_string(matches, ARG_MOBILE_APP_FULL_URL)?))
}

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let address = matches
        .get_one::<IpAddr>(ARG_ADDRESS)
        .copied()
        .context("missing required argument: --address")?;
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8005);

    let rps_opts = rps::Options::parse(matches)?;
    let ldap_opts = ldap::Options::parse(matches)?;
    let smtp_opts = smtp::Options::parse(matches)?;

    Ok(Action::Server(Args {
        address,
        port,
        config: config(matches, ldap_opts.show_errors)?,
        rps_host: rps_opts.host,
        rps_schema: rps_opts.schema,
        rps_ca_cert: rps_opts.ca_cert,
        ldap: ldap_opts.settings,
        smtp: smtp_opts.settings,
        templates_path: matches.get_one::<PathBuf>(ARG_TEMPLATES_PATH).cloned(),
    }))
}
