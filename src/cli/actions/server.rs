use crate::{
    api::{self, config::Config, state::App, templates::Templates},
    directory::{LdapDirectory, LdapSettings},
    mail::{LogMailer, Mailer, SmtpMailer, SmtpSettings},
    rps::HttpRpsClient,
    tls,
};
use anyhow::Result;
use std::{
    net::IpAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub address: IpAddr,
    pub port: u16,
    pub config: Config,
    pub rps_host: String,
    pub rps_schema: String,
    pub rps_ca_cert: Option<PathBuf>,
    pub ldap: Option<LdapSettings>,
    pub smtp: Option<SmtpSettings>,
    pub templates_path: Option<PathBuf>,
}

fn log_startup_args(args: &Args) {
    debug!(
        address = %args.address,
        port = args.port,
        rps = %format!("{}://{}", args.rps_schema, args.rps_host),
        rps_ca_cert = ?args.rps_ca_cert,
        ldap = ?args.ldap,
        smtp = ?args.smtp,
        templates_path = ?args.templates_path,
        config = ?args.config,
        "startup arguments"
    );
}

fn mailer(settings: Option<&SmtpSettings>) -> Result<Arc<dyn Mailer>> {
    if let Some(settings) = settings {
        info!(server = %settings.server, port = settings.port, "Sending activation mail via SMTP");
        return Ok(Arc::new(SmtpMailer::new(settings)?));
    }
    warn!("No SMTP server configured, activation mail is only logged");
    Ok(Arc::new(LogMailer))
}

/// LDAPS trusts the same CA bundle as the RPS client when one is configured.
fn directory(settings: LdapSettings, ca_cert: Option<&Path>) -> Result<LdapDirectory> {
    info!(url = %settings.url(), "LDAP verification enabled");
    match ca_cert {
        Some(path) if settings.use_tls => {
            let config = tls::load_ldap_tls_config(path)?;
            Ok(LdapDirectory::new(settings).with_tls_config(config))
        }
        _ => Ok(LdapDirectory::new(settings)),
    }
}

/// Build the application from the parsed arguments.
///
/// # Errors
/// Returns an error if the CA bundle, the SMTP relay or the templates cannot be loaded.
pub fn build_app(args: Args) -> Result<App> {
    let ca_certs = match &args.rps_ca_cert {
        Some(path) => tls::load_ca_bundle(path)?,
        None => Vec::new(),
    };
    let rps = HttpRpsClient::new(&args.rps_schema, &args.rps_host, ca_certs)?;
    info!(rps = %rps.base_url(), "RPS client ready");

    let templates = match &args.templates_path {
        Some(path) => Templates::from_dir(path)?,
        None => Templates::embedded()?,
    };

    let mut app = App::new(
        args.config,
        Arc::new(rps),
        mailer(args.smtp.as_ref())?,
        templates,
    );
    if let Some(settings) = args.ldap {
        app = app.with_directory(Arc::new(directory(settings, args.rps_ca_cert.as_deref())?));
    }

    Ok(app)
}

/// Execute the server action.
/// # Errors
/// Returns an error if the application cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let address = args.address;
    let port = args.port;
    let app = build_app(args)?;

    api::new(address, port, Arc::new(app)).await
}
