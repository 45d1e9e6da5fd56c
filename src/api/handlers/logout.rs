//! Logout (`GET|POST|OPTIONS /logout`).
//!
//! GET ends the caller's own session. POST is used by the RPS for remote
//! logout and names the session and user explicitly.

use axum::http::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::verify::INVALID_JSON;
use crate::api::{
    cookie::clear_cookie,
    error::{bad_request, Error},
    pipeline::{Incoming, Outgoing, RequestContext},
};

#[derive(Debug, Deserialize)]
struct LogoutRequest {
    #[serde(rename = "sessionToken", default)]
    session_token: String,
    #[serde(rename = "userId", default)]
    user_id: String,
}

/// # Errors
/// 400 on an undecodable body or when the session belongs to another user.
pub async fn logout(
    ctx: &mut RequestContext,
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    let sessions = ctx.app.sessions();

    if req.method() == Method::GET {
        sessions.delete(&ctx.session_id).await;
        clear_cookie(&mut res.headers, ctx.app.config().session_cookie());
        res.redirect("/");
        return Ok(StatusCode::MOVED_PERMANENTLY);
    }

    if req.method() == Method::OPTIONS {
        return Ok(StatusCode::OK);
    }

    let request: LogoutRequest = serde_json::from_slice(&req.body).map_err(|err| {
        debug!("Invalid logout request: {err}");
        bad_request(INVALID_JSON)
    })?;
    debug!(session_token = %request.session_token, "logout requested");
    ctx.user_id.clone_from(&request.user_id);

    // An absent session has no user, so it only matches an empty user id.
    let stored_user = sessions
        .get(&request.session_token)
        .await
        .map(|session| session.user)
        .unwrap_or_default();
    if stored_user != request.user_id {
        warn!(
            logged_user = %stored_user,
            requested_user = %request.user_id,
            "logout user mismatch"
        );
        return Err(bad_request("Logout failed"));
    }

    sessions.delete(&request.session_token).await;
    Ok(StatusCode::OK)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::{
        config::Config,
        handlers::test_support::{incoming, Fixture},
        session::Session,
    };
    use axum::http::header::{LOCATION, SET_COOKIE};

    #[tokio::test]
    async fn get_ends_own_session() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(Config::new());
        ctx.session_id = "SID".to_string();
        ctx.app.sessions().put("SID", Session::for_user("alice")).await;

        let mut res = Outgoing::default();
        let status = logout(&mut ctx, &incoming("GET", "/logout", ""), &mut res)
            .await
            .unwrap();

        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers[LOCATION], "/");
        assert_eq!(
            res.headers[SET_COOKIE],
            "rpa_session=; Expires=Thu, 01 Jan 1970 00:00:01 GMT"
        );
        assert!(ctx.app.sessions().get("SID").await.is_err());
    }

    #[tokio::test]
    async fn options_is_a_no_op() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(Config::new());
        let mut res = Outgoing::default();
        let status = logout(&mut ctx, &incoming("OPTIONS", "/logout", ""), &mut res)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(res.headers.is_empty());
    }

    #[tokio::test]
    async fn post_with_mismatched_user_keeps_session() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(Config::new());
        ctx.app.sessions().put("123", Session::for_user("alice")).await;

        let body = r#"{"sessionToken":"123","userId":"mismatched"}"#;
        let mut res = Outgoing::default();
        let err = logout(&mut ctx, &incoming("POST", "/logout", body), &mut res)
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_body(), "Logout failed");
        assert_eq!(ctx.app.sessions().get("123").await.unwrap().user, "alice");
    }

    #[tokio::test]
    async fn post_with_matching_user_deletes_session() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(Config::new());
        ctx.app.sessions().put("123", Session::for_user("alice")).await;

        let body = r#"{"sessionToken":"123","userId":"alice"}"#;
        let mut res = Outgoing::default();
        let status = logout(&mut ctx, &incoming("POST", "/logout", body), &mut res)
            .await
            .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx.user_id, "alice");
        assert!(ctx.app.sessions().is_empty().await);

        // Repeating the logout of an absent session with no user is harmless.
        let body = r#"{"sessionToken":"123","userId":""}"#;
        let status = logout(&mut ctx, &incoming("POST", "/logout", body), &mut res)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn post_with_invalid_json_is_bad_request() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(Config::new());
        let mut res = Outgoing::default();
        let err = logout(&mut ctx, &incoming("POST", "/logout", "{"), &mut res)
            .await
            .unwrap_err();
        assert_eq!(err.public_body(), INVALID_JSON);
    }
}
