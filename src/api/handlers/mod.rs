//! Pipeline stages.
//!
//! The shared stages (base headers, session resolution, method guard) and the
//! small page handlers live here; the identity protocol flows have their own
//! modules.

pub mod activate;
pub mod authenticate;
pub mod logout;
pub mod signature;
pub mod verify;

use anyhow::Context;
use axum::http::{
    header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE,
        EXPIRES, PRAGMA,
    },
    HeaderName, StatusCode,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::{
    cookie::{read_secure_cookie, write_secure_cookie, Cookie},
    error::Error,
    pipeline::{Incoming, Outgoing, RequestContext},
    session::{generate_session_id, Session},
};
use crate::GIT_COMMIT_HASH;

const ALLOWED_HEADERS: &str = "Content-Type, Depth, User-Agent, X-File-Size, X-Requested-With, \
     X-Requested-By, If-Modified-Since, X-File-Name, Cache-Control, Pragma, Expires, WWW-Authenticate";

/// Hex-only check shared by the identity validators.
pub(crate) fn is_hex(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_hexdigit())
}

pub(crate) fn x_app_header() -> String {
    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };
    format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
}

/// Default CORS and no-cache headers.
pub fn base_headers(res: &mut Outgoing) -> StatusCode {
    res.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    res.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
    res.set_header(ACCESS_CONTROL_ALLOW_METHODS, "GET,POST,HEAD,OPTIONS");
    res.set_header(ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS);
    res.set_header(
        CACHE_CONTROL,
        "no-cache, no-storage, max-age=0, must-revalidate",
    );
    res.set_header(PRAGMA, "no-cache");
    res.set_header(EXPIRES, "Sat, 26 Jul 1997 05:00:00 GMT");
    res.set_header(HeaderName::from_static("x-app"), &x_app_header());
    StatusCode::OK
}

/// Bind the request to a session, creating one when the cookie is missing
/// or names an unknown or expired session.
///
/// # Errors
/// [`Error::Internal`] if a new session id cannot be generated.
pub async fn resolve_session(
    ctx: &mut RequestContext,
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    let app = Arc::clone(&ctx.app);
    let config = app.config();
    let sessions = app.sessions();

    let existing = match read_secure_cookie(
        req.headers(),
        config.session_cookie(),
        config.secure_cookie(),
    ) {
        Ok(id) => match sessions.get(&id).await {
            Ok(session) => Some((id, session)),
            Err(err) => {
                debug!("{err}, starting a new session");
                None
            }
        },
        Err(_) => None,
    };

    let (session_id, session) = match existing {
        Some(found) => found,
        None => (
            generate_session_id().context("Failed to generate session id")?,
            Session::anonymous(),
        ),
    };

    let user = session.user.clone();
    sessions.put(&session_id, session).await;
    write_secure_cookie(
        &mut res.headers,
        Cookie::new(config.session_cookie(), session_id.as_str())
            .with_max_age(config.session_ttl_seconds()),
        config.secure_cookie(),
    );

    if !user.is_empty() {
        debug!(user = %user, "session bound to user");
    }
    ctx.session_id = session_id;
    ctx.logged_user.clone_from(&user);
    ctx.user_id = user;

    Ok(StatusCode::OK)
}

/// Declare the allowed methods and reject anything else.
///
/// # Errors
/// [`Error::MethodNotAllowed`] when the request method is not listed.
pub fn allow_methods(
    allowed: &[&str],
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    res.set_header(ACCESS_CONTROL_ALLOW_METHODS, &allowed.join(","));
    if allowed.contains(&req.method().as_str()) {
        Ok(StatusCode::OK)
    } else {
        Err(Error::MethodNotAllowed)
    }
}

/// Hook consulted by the RPS before handing out a time permit; every
/// identity is permitted.
pub fn permit_user(res: &mut Outgoing) -> StatusCode {
    res.set_header(CONTENT_TYPE, "application/json");
    StatusCode::OK
}

#[derive(Serialize)]
struct IndexPage<'a> {
    static_url_base: &'a str,
    pinpad_url: &'a str,
    user: &'a str,
    client_settings_url: &'a str,
    mobile_app_full_url: &'a str,
}

/// Home page; every unmatched path ends here and gets a 404.
///
/// # Errors
/// [`Error::NotFound`] for any path but `/`, [`Error::MethodNotAllowed`]
/// for methods other than GET and HEAD, [`Error::Internal`] on render failure.
pub fn index(
    ctx: &mut RequestContext,
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    if req.path() != "/" {
        return Err(Error::NotFound("Page not found".to_string()));
    }
    allow_methods(&["GET", "HEAD"], req, res)?;

    let config = ctx.app.config();
    let page = IndexPage {
        static_url_base: config.static_url_base(),
        pinpad_url: config.pinpad_url(),
        user: &ctx.logged_user,
        client_settings_url: config.client_settings_url(),
        mobile_app_full_url: config.mobile_app_full_url(),
    };
    let html = ctx.app.templates().render("index", &page)?;
    res.write_html(html);
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct ProtectedPage<'a> {
    welcome: bool,
    user: &'a str,
    static_url_base: &'a str,
}

/// Pages reserved to signed-in users: `/protected` and `/protected/<page>`.
///
/// # Errors
/// [`Error::NotFound`] for an unknown page, [`Error::Internal`] on render failure.
pub fn protected(
    ctx: &mut RequestContext,
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    allow_methods(&["GET"], req, res)?;

    if ctx.logged_user.is_empty() {
        res.redirect("/");
        return Ok(StatusCode::MOVED_PERMANENTLY);
    }

    let page = req
        .path()
        .trim_start_matches("/protected")
        .trim_matches('/');
    let template = if page.is_empty() {
        "protected".to_string()
    } else {
        format!("protected_{page}")
    };
    if !ctx.app.templates().has(&template) {
        return Err(Error::NotFound(format!("No page {page}")));
    }

    let html = ctx.app.templates().render(
        &template,
        &ProtectedPage {
            welcome: false,
            user: &ctx.logged_user,
            static_url_base: ctx.app.config().static_url_base(),
        },
    )?;
    res.write_html(html);
    Ok(StatusCode::OK)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    //! Collaborator doubles shared by the handler tests.

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use std::sync::{Arc, Mutex};

    use crate::{
        api::{
            config::Config,
            pipeline::{Incoming, RequestContext},
            state::App,
            templates::Templates,
        },
        directory::Directory,
        mail::Mailer,
        rps::{AuthOutcome, LoginResult, RpsClient},
    };

    #[derive(Default)]
    pub struct FakeRps {
        pub outcome: Mutex<Option<AuthOutcome>>,
        pub reported: Mutex<Vec<(String, String, u16)>>,
        pub activated: Mutex<Vec<(String, String)>>,
        pub fail_activation: bool,
    }

    impl FakeRps {
        pub fn answering(outcome: AuthOutcome) -> Self {
            Self {
                outcome: Mutex::new(Some(outcome)),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RpsClient for FakeRps {
        async fn authenticate(&self, _session_id: &str, _auth_ott: &str) -> AuthOutcome {
            self.outcome
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(AuthOutcome {
                    user_id: String::new(),
                    message: "Server error".to_string(),
                    status: 500,
                })
        }

        async fn report_login_result(&self, result: LoginResult<'_>) -> Result<()> {
            self.reported.lock().unwrap().push((
                result.session_id.to_string(),
                result.user_id.to_string(),
                result.status,
            ));
            Ok(())
        }

        async fn activate_user(&self, identity: &str, activate_key: &str) -> Result<()> {
            if self.fail_activation {
                return Err(anyhow!("RPS user activation failed: Error code 500"));
            }
            self.activated
                .lock()
                .unwrap()
                .push((identity.to_string(), activate_key.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingMailer {
        pub links: Mutex<Vec<(String, String, String)>>,
        pub codes: Mutex<Vec<(String, String, i64)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_activation_link(
            &self,
            recipient: &str,
            device_name: &str,
            validate_url: &str,
        ) -> Result<()> {
            self.links.lock().unwrap().push((
                recipient.to_string(),
                device_name.to_string(),
                validate_url.to_string(),
            ));
            Ok(())
        }

        async fn send_activation_code(
            &self,
            recipient: &str,
            device_name: &str,
            activation_code: i64,
        ) -> Result<()> {
            self.codes.lock().unwrap().push((
                recipient.to_string(),
                device_name.to_string(),
                activation_code,
            ));
            Ok(())
        }
    }

    pub enum FakeDirectory {
        Entries(usize),
        Down,
    }

    #[async_trait]
    impl Directory for FakeDirectory {
        async fn count_entries(&self, _user_id: &str) -> Result<usize> {
            match self {
                Self::Entries(count) => Ok(*count),
                Self::Down => Err(anyhow!("Remote LDAP connection failed")),
            }
        }
    }

    pub struct Fixture {
        pub rps: Arc<FakeRps>,
        pub mailer: Arc<RecordingMailer>,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                rps: Arc::new(FakeRps::default()),
                mailer: Arc::new(RecordingMailer::default()),
            }
        }

        pub fn with_rps(rps: FakeRps) -> Self {
            Self {
                rps: Arc::new(rps),
                ..Self::new()
            }
        }

        pub fn app(&self, config: Config) -> App {
            App::new(
                config,
                self.rps.clone(),
                self.mailer.clone(),
                Templates::embedded().unwrap(),
            )
        }

        pub fn context(&self, config: Config) -> RequestContext {
            RequestContext::new(Arc::new(self.app(config)))
        }
    }

    pub fn incoming(method: &str, uri: &str, body: &str) -> Incoming {
        let (parts, ()) = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        Incoming {
            parts,
            body: body.to_string().into(),
            remote_addr: None,
        }
    }

    pub fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}
