//! Application configuration threaded through the pipeline and handlers.

use super::session::{DEFAULT_SESSION_TTL_SECONDS, MAX_SESSION_TTL_SECONDS};

const DEFAULT_SESSION_COOKIE: &str = "rpa_session";
const DEFAULT_VERIFY_IDENTITY_URL: &str = "http://localhost:8005/mpinActivate";
const DEFAULT_STATIC_URL_BASE: &str = "/public/";
const DEFAULT_PINPAD_URL: &str = "https://mpin.certivox.net/v3/mpin.js";
const DEFAULT_CLIENT_SETTINGS_URL: &str = "/rps/clientSettings";
const DEFAULT_MOBILE_APP_FULL_URL: &str = "/m/";

#[derive(Clone, Debug)]
pub struct Config {
    force_activate: bool,
    request_otp: bool,
    verify_identity_url: String,
    show_directory_errors: bool,
    session_cookie: String,
    session_ttl_seconds: i64,
    secure_cookie: bool,
    static_url_base: String,
    pinpad_url: String,
    client_settings_url: String,
    mobile_app_full_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self {
            force_activate: false,
            request_otp: false,
            verify_identity_url: DEFAULT_VERIFY_IDENTITY_URL.to_string(),
            show_directory_errors: false,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            secure_cookie: false,
            static_url_base: DEFAULT_STATIC_URL_BASE.to_string(),
            pinpad_url: DEFAULT_PINPAD_URL.to_string(),
            client_settings_url: DEFAULT_CLIENT_SETTINGS_URL.to_string(),
            mobile_app_full_url: DEFAULT_MOBILE_APP_FULL_URL.to_string(),
        }
    }

    /// Skip directory checks and activation mail; identities activate without verification.
    #[must_use]
    pub fn with_force_activate(mut self, force: bool) -> Self {
        self.force_activate = force;
        self
    }

    #[must_use]
    pub fn with_request_otp(mut self, request_otp: bool) -> Self {
        self.request_otp = request_otp;
        self
    }

    #[must_use]
    pub fn with_verify_identity_url(mut self, url: String) -> Self {
        self.verify_identity_url = url;
        self
    }

    /// Report an empty directory search as `403` instead of treating it as success.
    #[must_use]
    pub fn with_show_directory_errors(mut self, show: bool) -> Self {
        self.show_directory_errors = show;
        self
    }

    #[must_use]
    pub fn with_session_cookie(mut self, name: String) -> Self {
        self.session_cookie = name;
        self
    }

    /// Clamped to between one second and one year.
    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds.clamp(1, MAX_SESSION_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    #[must_use]
    pub fn with_static_url_base(mut self, url: String) -> Self {
        self.static_url_base = url;
        self
    }

    #[must_use]
    pub fn with_pinpad_url(mut self, url: String) -> Self {
        self.pinpad_url = url;
        self
    }

    #[must_use]
    pub fn with_client_settings_url(mut self, url: String) -> Self {
        self.client_settings_url = url;
        self
    }

    #[must_use]
    pub fn with_mobile_app_full_url(mut self, url: String) -> Self {
        self.mobile_app_full_url = url;
        self
    }

    #[must_use]
    pub fn force_activate(&self) -> bool {
        self.force_activate
    }

    #[must_use]
    pub fn request_otp(&self) -> bool {
        self.request_otp
    }

    #[must_use]
    pub fn verify_identity_url(&self) -> &str {
        &self.verify_identity_url
    }

    #[must_use]
    pub fn show_directory_errors(&self) -> bool {
        self.show_directory_errors
    }

    #[must_use]
    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn secure_cookie(&self) -> bool {
        self.secure_cookie
    }

    #[must_use]
    pub fn static_url_base(&self) -> &str {
        &self.static_url_base
    }

    #[must_use]
    pub fn pinpad_url(&self) -> &str {
        &self.pinpad_url
    }

    #[must_use]
    pub fn client_settings_url(&self) -> &str {
        &self.client_settings_url
    }

    #[must_use]
    pub fn mobile_app_full_url(&self) -> &str {
        &self.mobile_app_full_url
    }
}
