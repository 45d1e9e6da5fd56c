pub mod ldap;
pub mod logging;
pub mod rps;
pub mod smtp;

use crate::api::session::MAX_SESSION_TTL_SECONDS;
use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};
use std::{net::IpAddr, path::PathBuf};

pub const ARG_ADDRESS: &str = "address";
pub const ARG_PORT: &str = "port";
pub const ARG_FORCE_ACTIVATE: &str = "force-activate";
pub const ARG_REQUEST_OTP: &str = "request-otp";
pub const ARG_VERIFY_IDENTITY_URL: &str = "verify-identity-url";
pub const ARG_SECURE_COOKIE: &str = "secure-cookie";
pub const ARG_SESSION_COOKIE: &str = "session-cookie";
pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_PINPAD_URL: &str = "pinpad-url";
pub const ARG_CLIENT_SETTINGS_URL: &str = "client-settings-url";
pub const ARG_MOBILE_APP_FULL_URL: &str = "mobile-app-full-url";
pub const ARG_STATIC_URL_BASE: &str = "static-url-base";
pub const ARG_TEMPLATES_PATH: &str = "templates-path";

fn server_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADDRESS)
                .short('a')
                .long(ARG_ADDRESS)
                .help("Address to listen on")
                .default_value("::")
                .env("RPA_ADDRESS")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8005")
                .env("RPA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_FORCE_ACTIVATE)
                .long(ARG_FORCE_ACTIVATE)
                .help("Activate identities without directory check or activation mail")
                .env("RPA_FORCE_ACTIVATE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_REQUEST_OTP)
                .long(ARG_REQUEST_OTP)
                .help("Answer logins with a one-time password window")
                .env("RPA_REQUEST_OTP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_VERIFY_IDENTITY_URL)
                .long(ARG_VERIFY_IDENTITY_URL)
                .help("Activation page URL used in activation links")
                .default_value("http://localhost:8005/mpinActivate")
                .env("RPA_VERIFY_IDENTITY_URL"),
        )
}

fn session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECURE_COOKIE)
                .long(ARG_SECURE_COOKIE)
                .help("Mark the session cookie Secure")
                .env("RPA_SECURE_COOKIE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE)
                .long(ARG_SESSION_COOKIE)
                .help("Session cookie name")
                .default_value("rpa_session")
                .env("RPA_SESSION_COOKIE"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session lifetime in seconds")
                .default_value("14400")
                .env("RPA_SESSION_TTL")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
}

fn page_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PINPAD_URL)
                .long(ARG_PINPAD_URL)
                .help("PIN pad script URL")
                .default_value("https://mpin.certivox.net/v3/mpin.js")
                .env("RPA_PINPAD_URL"),
        )
        .arg(
            Arg::new(ARG_CLIENT_SETTINGS_URL)
                .long(ARG_CLIENT_SETTINGS_URL)
                .help("Client settings URL")
                .default_value("/rps/clientSettings")
                .env("RPA_CLIENT_SETTINGS_URL"),
        )
        .arg(
            Arg::new(ARG_MOBILE_APP_FULL_URL)
                .long(ARG_MOBILE_APP_FULL_URL)
                .help("Mobile application URL")
                .default_value("/m/")
                .env("RPA_MOBILE_APP_FULL_URL"),
        )
        .arg(
            Arg::new(ARG_STATIC_URL_BASE)
                .long(ARG_STATIC_URL_BASE)
                .help("Base URL of static assets")
                .default_value("/public/")
                .env("RPA_STATIC_URL_BASE"),
        )
        .arg(
            Arg::new(ARG_TEMPLATES_PATH)
                .long(ARG_TEMPLATES_PATH)
                .help("Directory of *.hbs page templates (embedded pages when unset)")
                .env("RPA_TEMPLATES_PATH")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("rpa")
        .about("Relying-party front end for identity activation and login")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles);

    let command = server_args(command);
    let command = session_args(command);
    let command = page_args(command);
    let command = rps::with_args(command);
    let command = ldap::with_args(command);
    let command = smtp::with_args(command);
    logging::with_args(command)
}
