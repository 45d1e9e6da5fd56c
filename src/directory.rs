//! Optional LDAP directory check used by identity verification.
//!
//! Only the number of entries matching the configured filter is consulted.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ldap3::{ldap_escape, LdapConnAsync, LdapConnSettings, Scope, SearchOptions, SearchResult};
use rustls::ClientConfig;
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

const SEARCH_TIME_LIMIT_SECONDS: i32 = 600;
const CONNECT_TIMEOUT_SECONDS: u64 = 10;
// LDAP result codes accepted for a size-limited search.
const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;

#[async_trait]
pub trait Directory: Send + Sync {
    /// Count entries matching `user_id`.
    ///
    /// # Errors
    /// Connect, bind or search failures.
    async fn count_entries(&self, user_id: &str) -> Result<usize>;
}

pub struct LdapSettings {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub bind_dn: String,
    pub bind_password: SecretString,
    pub base_dn: String,
    /// Search filter; `%s` is replaced by the escaped user id.
    pub filter: String,
}

impl std::fmt::Debug for LdapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"***")
            .field("base_dn", &self.base_dn)
            .field("filter", &self.filter)
            .finish()
    }
}

impl LdapSettings {
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.server, self.port)
    }

    #[must_use]
    pub fn search_filter(&self, user_id: &str) -> String {
        self.filter.replace("%s", &ldap_escape(user_id))
    }

    fn bind_credentials(&self) -> Option<(&str, &str)> {
        let password = self.bind_password.expose_secret();
        (!self.bind_dn.is_empty() && !password.is_empty()).then_some((self.bind_dn.as_str(), password))
    }
}

#[derive(Debug)]
pub struct LdapDirectory {
    settings: LdapSettings,
    /// Pinned trust roots for `ldaps://`; the system roots when `None`.
    tls_config: Option<Arc<ClientConfig>>,
}

impl LdapDirectory {
    #[must_use]
    pub fn new(settings: LdapSettings) -> Self {
        Self {
            settings,
            tls_config: None,
        }
    }

    #[must_use]
    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    fn conn_settings(&self) -> (LdapConnSettings, bool) {
        let settings =
            LdapConnSettings::new().set_conn_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS));
        match &self.tls_config {
            Some(config) if self.settings.use_tls => (settings.set_config(Arc::clone(config)), true),
            _ => (settings, false),
        }
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    #[instrument(skip(self))]
    async fn count_entries(&self, user_id: &str) -> Result<usize> {
        let url = self.settings.url();
        let (conn_settings, pinned) = self.conn_settings();
        debug!(url = %url, pinned, "connecting to directory");

        let (conn, mut ldap) = LdapConnAsync::with_settings(conn_settings, &url)
            .await
            .with_context(|| format!("Remote LDAP connection failed: {url}"))?;

        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!("LDAP connection error: {err}");
            }
        });

        if let Some((dn, password)) = self.settings.bind_credentials() {
            ldap.simple_bind(dn, password)
                .await
                .context("LDAP bind failed")?
                .success()
                .context("LDAP bind failed")?;
        }

        let filter = self.settings.search_filter(user_id);
        debug!(filter = %filter, "searching directory");

        let SearchResult(entries, result) = ldap
            .with_search_options(
                SearchOptions::new()
                    .sizelimit(1)
                    .timelimit(SEARCH_TIME_LIMIT_SECONDS)
                    .typesonly(true),
            )
            .search(&self.settings.base_dn, Scope::Subtree, &filter, vec!["1.1"])
            .await
            .context("LDAP search failed")?;

        if let Err(err) = ldap.unbind().await {
            debug!("LDAP unbind failed: {err}");
        }

        if result.rc != RC_SUCCESS && result.rc != RC_SIZE_LIMIT_EXCEEDED {
            bail!("LDAP search failed: rc={} {}", result.rc, result.text);
        }

        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LdapSettings {
        LdapSettings {
            server: "ldap.example.com".to_string(),
            port: 389,
            use_tls: false,
            bind_dn: String::new(),
            bind_password: SecretString::from(String::new()),
            base_dn: "dc=example,dc=com".to_string(),
            filter: "(uid=%s)".to_string(),
        }
    }

    #[test]
    fn url_follows_tls_flag() {
        let mut settings = settings();
        assert_eq!(settings.url(), "ldap://ldap.example.com:389");
        settings.use_tls = true;
        settings.port = 636;
        assert_eq!(settings.url(), "ldaps://ldap.example.com:636");
    }

    #[test]
    fn filter_escapes_user_id() {
        let settings = settings();
        assert_eq!(settings.search_filter("alice"), "(uid=alice)");
        assert_eq!(settings.search_filter("a*)(uid=*"), "(uid=a\\2a\\29\\28uid=\\2a)");
    }

    #[test]
    fn bind_requires_dn_and_password() {
        let mut settings = settings();
        assert!(settings.bind_credentials().is_none());
        settings.bind_dn = "cn=admin,dc=example,dc=com".to_string();
        assert!(settings.bind_credentials().is_none());
        settings.bind_password = SecretString::from("secret");
        assert_eq!(
            settings.bind_credentials(),
            Some(("cn=admin,dc=example,dc=com", "secret"))
        );
    }

    fn empty_roots() -> Arc<ClientConfig> {
        Arc::new(
            ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(rustls::RootCertStore::empty())
                .with_no_client_auth(),
        )
    }

    #[test]
    fn pinned_roots_apply_to_ldaps_only() {
        let directory = LdapDirectory::new(settings()).with_tls_config(empty_roots());
        assert!(!directory.conn_settings().1);

        let mut ldaps = settings();
        ldaps.use_tls = true;
        let directory = LdapDirectory::new(ldaps).with_tls_config(empty_roots());
        assert!(directory.conn_settings().1);

        let mut ldaps = settings();
        ldaps.use_tls = true;
        assert!(!LdapDirectory::new(ldaps).conn_settings().1);
    }

    #[test]
    fn debug_redacts_password() {
        let mut settings = settings();
        settings.bind_password = SecretString::from("hunter2");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
