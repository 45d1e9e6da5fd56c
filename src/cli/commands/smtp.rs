use crate::mail::SmtpSettings;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_SERVER: &str = "smtp-server";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USER: &str = "smtp-user";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_USE_TLS: &str = "smtp-use-tls";
pub const ARG_EMAIL_SENDER: &str = "email-sender";
pub const ARG_EMAIL_SUBJECT: &str = "email-subject";

#[derive(Debug)]
pub struct Options {
    /// SMTP relay, absent when mail is only logged.
    pub settings: Option<SmtpSettings>,
}

impl Options {
    /// Parse SMTP arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a server is given without a sender address.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let Some(server) = matches
            .get_one::<String>(ARG_SMTP_SERVER)
            .filter(|v| !v.trim().is_empty())
            .cloned()
        else {
            return Ok(Self { settings: None });
        };

        let read_optional =
            |id: &str| -> String { matches.get_one::<String>(id).cloned().unwrap_or_default() };
        let sender = read_optional(ARG_EMAIL_SENDER);
        if sender.trim().is_empty() {
            anyhow::bail!("missing required argument: --{ARG_EMAIL_SENDER}");
        }

        Ok(Self {
            settings: Some(SmtpSettings {
                server,
                port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(25),
                user: read_optional(ARG_SMTP_USER),
                password: SecretString::from(read_optional(ARG_SMTP_PASSWORD)),
                use_tls: matches.get_flag(ARG_SMTP_USE_TLS),
                sender,
                subject: read_optional(ARG_EMAIL_SUBJECT),
            }),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_SERVER)
                .long(ARG_SMTP_SERVER)
                .help("SMTP relay host; activation mail is only logged when unset")
                .env("RPA_SMTP_SERVER"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("RPA_SMTP_PORT")
                .default_value("25")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USER)
                .long(ARG_SMTP_USER)
                .help("SMTP user")
                .env("RPA_SMTP_USER"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("RPA_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_USE_TLS)
                .long(ARG_SMTP_USE_TLS)
                .help("Use STARTTLS")
                .env("RPA_SMTP_USE_TLS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_EMAIL_SENDER)
                .long(ARG_EMAIL_SENDER)
                .help("From address of activation mail")
                .env("RPA_EMAIL_SENDER"),
        )
        .arg(
            Arg::new(ARG_EMAIL_SUBJECT)
                .long(ARG_EMAIL_SUBJECT)
                .help("Subject of activation mail")
                .env("RPA_EMAIL_SUBJECT")
                .default_value("Activate your identity"),
        )
}
