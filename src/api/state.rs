//! Shared application state: configuration, the session store and collaborators.

use chrono::Duration;
use std::sync::Arc;

use super::{config::Config, session::SessionStore, templates::Templates};
use crate::{directory::Directory, mail::Mailer, rps::RpsClient};

pub struct App {
    config: Config,
    sessions: SessionStore,
    rps: Arc<dyn RpsClient>,
    directory: Option<Arc<dyn Directory>>,
    mailer: Arc<dyn Mailer>,
    templates: Templates,
}

impl App {
    /// The session store default TTL follows `config`.
    #[must_use]
    pub fn new(
        config: Config,
        rps: Arc<dyn RpsClient>,
        mailer: Arc<dyn Mailer>,
        templates: Templates,
    ) -> Self {
        let sessions = SessionStore::new(Duration::seconds(config.session_ttl_seconds()));
        Self {
            config,
            sessions,
            rps,
            directory: None,
            mailer,
            templates,
        }
    }

    /// Enable directory verification during identity verify.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn rps(&self) -> &dyn RpsClient {
        self.rps.as_ref()
    }

    #[must_use]
    pub fn directory(&self) -> Option<&dyn Directory> {
        self.directory.as_deref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    #[must_use]
    pub fn templates(&self) -> &Templates {
        &self.templates
    }
}
