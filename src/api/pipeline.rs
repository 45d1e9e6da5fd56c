//! Ordered request stages with short-circuit on failure.
//!
//! Every route is a [`Pipeline`]: a fixed list of [`Stage`]s run against one
//! [`RequestContext`]. A stage returns the status it wants to answer with; the
//! first stage that fails aborts the chain and its error becomes the response.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::ConnectInfo,
    http::{
        header::{CONTENT_TYPE, LOCATION, X_CONTENT_TYPE_OPTIONS},
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, warn};

use super::{
    error::Error,
    handlers::{self, activate, authenticate, logout, verify},
    state::App,
};

/// Request bodies above this size are rejected before any stage runs.
const MAX_BODY_BYTES: usize = 64 * 1024;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Per-request scratch state shared by all stages.
pub struct RequestContext {
    pub app: Arc<App>,
    pub session_id: String,
    /// User bound to the session; empty when anonymous.
    pub logged_user: String,
    /// User the request acts on, for audit logging.
    pub user_id: String,
}

impl RequestContext {
    #[must_use]
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            session_id: String::new(),
            logged_user: String::new(),
            user_id: String::new(),
        }
    }
}

/// The buffered request as seen by stages.
pub struct Incoming {
    pub parts: Parts,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl Incoming {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// First value of a query parameter, empty when absent.
    #[must_use]
    pub fn query_param(&self, name: &str) -> String {
        self.parts
            .uri
            .query()
            .and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_default()
    }

    /// First value of a form field, empty when absent.
    ///
    /// A urlencoded POST body is searched before the query string.
    #[must_use]
    pub fn form_param(&self, name: &str) -> String {
        let urlencoded = self
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(FORM_URLENCODED));
        if self.parts.method == Method::POST && urlencoded {
            if let Some((_, value)) =
                url::form_urlencoded::parse(&self.body).find(|(key, _)| key == name)
            {
                return value.into_owned();
            }
        }
        self.query_param(name)
    }

    fn remote(&self) -> String {
        self.remote_addr
            .map_or_else(|| "-".to_string(), |addr| addr.to_string())
    }
}

/// Response headers and body accumulated by stages.
#[derive(Debug, Default)]
pub struct Outgoing {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Outgoing {
    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(err) => warn!("Dropping invalid {name} header: {err}"),
        }
    }

    /// Serialize `value` as the JSON body.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] if the value cannot be encoded.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.body = serde_json::to_vec(value)
            .map_err(|err| Error::Internal(anyhow::Error::new(err).context("Failed to encode response")))?;
        self.set_header(CONTENT_TYPE, "application/json");
        Ok(())
    }

    pub fn write_html(&mut self, html: String) {
        self.body = html.into_bytes();
        self.set_header(CONTENT_TYPE, "text/html; charset=utf-8");
    }

    /// Point the client at `location`; the caller returns the redirect status.
    pub fn redirect(&mut self, location: &str) {
        self.set_header(LOCATION, location);
    }

    /// Replace the body with the error text; headers set so far are kept.
    fn fail(&mut self, err: &Error) {
        self.body = format!("{}\n", err.public_body()).into_bytes();
        self.set_header(CONTENT_TYPE, "text/plain; charset=utf-8");
        self.set_header(X_CONTENT_TYPE_OPTIONS, "nosniff");
    }

    fn into_response(self, status: StatusCode) -> Response {
        (status, self.headers, self.body).into_response()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// CORS, no-cache and `X-App` headers.
    BaseHeaders,
    /// Resolve or create the session from the cookie.
    Session,
    /// Method allow-list guard.
    Allow(&'static [&'static str]),
    Verify,
    Authenticate,
    Activate,
    PermitUser,
    Logout,
    Index,
    Protected,
}

impl Stage {
    async fn run(
        self,
        ctx: &mut RequestContext,
        req: &Incoming,
        res: &mut Outgoing,
    ) -> Result<StatusCode, Error> {
        match self {
            Self::BaseHeaders => Ok(handlers::base_headers(res)),
            Self::Session => handlers::resolve_session(ctx, req, res).await,
            Self::Allow(methods) => handlers::allow_methods(methods, req, res),
            Self::Verify => verify::verify_user(ctx, req, res).await,
            Self::Authenticate => authenticate::authenticate_user(ctx, req, res).await,
            Self::Activate => activate::activate(ctx, req, res).await,
            Self::PermitUser => Ok(handlers::permit_user(res)),
            Self::Logout => logout::logout(ctx, req, res).await,
            Self::Index => handlers::index(ctx, req, res),
            Self::Protected => handlers::protected(ctx, req, res),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    stages: Arc<[Stage]>,
}

impl Pipeline {
    #[must_use]
    pub fn new(stages: &[Stage]) -> Self {
        Self {
            stages: Arc::from(stages),
        }
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage in order and turn the outcome into a response.
    pub async fn serve(&self, app: Arc<App>, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (body, read_error) = match to_bytes(body, MAX_BODY_BYTES).await {
            Ok(body) => (body, None),
            Err(err) => (Bytes::new(), Some(err)),
        };

        let req = Incoming {
            parts,
            body,
            remote_addr,
        };
        let mut ctx = RequestContext::new(app);
        let mut res = Outgoing::default();

        let outcome = match read_error {
            Some(err) => Err(Error::BadRequest(format!("BAD REQUEST. {err}"))),
            None => self.run(&mut ctx, &req, &mut res).await,
        };

        match outcome {
            Ok(status) => {
                info!(
                    status = status.as_u16(),
                    method = %req.method(),
                    path = req.path(),
                    remote = %req.remote(),
                    session_id = %ctx.session_id,
                    user_id = %ctx.user_id,
                    "request completed"
                );
                res.into_response(status)
            }
            Err(err) => {
                let status = err.status();
                error!(
                    session_id = %ctx.session_id,
                    user_id = %ctx.user_id,
                    status = status.as_u16(),
                    path = req.path(),
                    remote = %req.remote(),
                    error = %format!("{err:#}"),
                    "request failed"
                );
                res.fail(&err);
                res.into_response(status)
            }
        }
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        req: &Incoming,
        res: &mut Outgoing,
    ) -> Result<StatusCode, Error> {
        let mut status = StatusCode::OK;
        for stage in self.stages.iter() {
            status = stage.run(ctx, req, res).await?;
        }
        Ok(status)
    }
}
