//! Login with an auth OTT (`POST /mpinAuthenticate`).
//!
//! The OTT is exchanged at the RPS for the authenticated user. The outcome is
//! reported back to the RPS and, on success, bound to the caller's session.

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use super::{
    is_hex,
    verify::{json_object, INVALID_JSON, INVALID_KEY},
};
use crate::{
    api::{
        error::{bad_request, Error},
        pipeline::{Incoming, Outgoing, RequestContext},
        session::Session,
    },
    rps::{AuthOutcome, LoginResult},
};

const ENVELOPE_KEY: &str = "mpinResponse";
const RESPONSE_KEYS: [&str; 3] = ["authOTT", "version", "pass"];
const AUTH_OTT_LEN: usize = 64;
const OTP_TTL_SECONDS: i64 = 64;
const SOME_USER_DATA: &str = "This will be handled by onSuccessLogin handler.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OtpResponse {
    expire_time: i64,
    ttl_seconds: i64,
    now_time: i64,
}

impl OtpResponse {
    fn starting_now() -> Self {
        let now_time = Utc::now().timestamp() * 1000;
        Self {
            expire_time: now_time + OTP_TTL_SECONDS * 1000,
            ttl_seconds: OTP_TTL_SECONDS,
            now_time,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse<'a> {
    some_user_data: &'a str,
    user_id: &'a str,
}

/// Pull the OTT out of `{"mpinResponse": {"authOTT": ...}}`.
fn auth_ott(body: &[u8]) -> Result<String, Error> {
    let fields = json_object(body)?;
    if let Some(key) = fields.keys().find(|key| key.as_str() != ENVELOPE_KEY) {
        debug!("{key} argument unnecessary");
        return Err(bad_request(INVALID_KEY));
    }
    let Some(envelope) = fields.get(ENVELOPE_KEY) else {
        debug!("{ENVELOPE_KEY} argument missing");
        return Err(bad_request(INVALID_KEY));
    };
    let Value::Object(response) = envelope else {
        return Err(bad_request(INVALID_JSON));
    };
    if let Some(key) = response
        .keys()
        .find(|key| !RESPONSE_KEYS.contains(&key.as_str()))
    {
        debug!("{key} argument unnecessary");
        return Err(bad_request(INVALID_KEY));
    }

    let auth_ott = match response.get("authOTT") {
        Some(Value::String(auth_ott)) => auth_ott,
        Some(_) => return Err(bad_request(INVALID_JSON)),
        None => {
            debug!("authOTT argument missing");
            return Err(bad_request(INVALID_KEY));
        }
    };
    if auth_ott.len() != AUTH_OTT_LEN || !is_hex(auth_ott) {
        return Err(bad_request("BAD REQUEST. AUTH OTT"));
    }
    Ok(auth_ott.clone())
}

/// Report the outcome to the RPS and bind a successful login to the session.
///
/// Reporting is best effort: a failure is logged and never reaches the caller.
pub async fn propagate_login_result(ctx: &RequestContext, auth_ott: &str, outcome: &AuthOutcome) {
    let result = LoginResult {
        session_id: &ctx.session_id,
        user_id: &outcome.user_id,
        auth_ott,
        status: outcome.status,
        message: &outcome.message,
    };
    if let Err(err) = ctx.app.rps().report_login_result(result).await {
        error!(session_id = %ctx.session_id, "{err:#}");
    }

    if outcome.status == 200 && !ctx.session_id.is_empty() {
        ctx.app
            .sessions()
            .put(&ctx.session_id, Session::for_user(outcome.user_id.as_str()))
            .await;
        info!(session_id = %ctx.session_id, user_id = %outcome.user_id, "user logged in");
    }
}

/// # Errors
/// Malformed envelopes as 400; an RPS failure status is passed through.
pub async fn authenticate_user(
    ctx: &mut RequestContext,
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    let auth_ott = auth_ott(&req.body)?;

    let outcome = ctx.app.rps().authenticate(&ctx.session_id, &auth_ott).await;
    ctx.user_id.clone_from(&outcome.user_id);

    propagate_login_result(ctx, &auth_ott, &outcome).await;

    if ctx.app.config().request_otp() {
        res.write_json(&OtpResponse::starting_now())?;
    } else {
        res.write_json(&LoginResponse {
            some_user_data: SOME_USER_DATA,
            user_id: &outcome.user_id,
        })?;
    }

    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.as_u16() >= 400 {
        return Err(Error::Status {
            status,
            message: outcome.message,
        });
    }
    Ok(status)
}
