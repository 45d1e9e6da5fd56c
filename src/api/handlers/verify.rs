//! Identity verification requested by the RPS (`POST /mpinVerify`).
//!
//! The request schema is closed: unknown keys are rejected, and the fields are
//! validated in a fixed order so the first violation decides the answer.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::{is_hex, signature::device_name};
use crate::api::{
    error::{bad_request, Error},
    pipeline::{Incoming, Outgoing, RequestContext},
};

const ALLOWED_KEYS: [&str; 9] = [
    "mpinId",
    "userId",
    "expireTime",
    "mobile",
    "activateKey",
    "activationCode",
    "resend",
    "deviceName",
    "userData",
];
const REQUIRED_KEYS: [&str; 4] = ["mpinId", "userId", "expireTime", "mobile"];

/// Set by the RPS proxy to the public base URL of this service.
const RPS_BASE_URL: &str = "rps-base-url";

const MAX_USER_ID_LEN: usize = 256;
const EXPIRE_TIME_LEN: usize = 20;
const ACTIVATE_KEY_LEN: usize = 64;
const MAX_ACTIVATION_CODE_DIGITS: usize = 12;

pub const INVALID_JSON: &str = "BAD REQUEST. INVALID JSON";
pub const INVALID_KEY: &str = "BAD REQUEST. INVALID KEY";
pub const INVALID_USER_ID: &str = "BAD REQUEST. INVALID USER ID";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub mpin_id: String,
    pub user_id: String,
    pub expire_time: String,
    pub mobile: i64,
    #[serde(default)]
    pub activate_key: String,
    #[serde(default)]
    pub activation_code: i64,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    #[serde(rename = "forceActivate")]
    force_activate: bool,
}

/// Parse the body as a JSON object.
pub(crate) fn json_object(body: &[u8]) -> Result<Map<String, Value>, Error> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        _ => Err(bad_request(INVALID_JSON)),
    }
}

fn check_keys(fields: &Map<String, Value>) -> Result<(), Error> {
    if let Some(key) = fields.keys().find(|key| !ALLOWED_KEYS.contains(&key.as_str())) {
        debug!("{key} argument unnecessary");
        return Err(bad_request(INVALID_KEY));
    }
    if let Some(key) = REQUIRED_KEYS.iter().find(|key| !fields.contains_key(**key)) {
        debug!("{key} argument missing");
        return Err(bad_request(INVALID_KEY));
    }

    let conditional = match fields.get("mobile").and_then(Value::as_i64) {
        Some(1) => Some("activateKey"),
        Some(0) => Some("activationCode"),
        _ => None,
    };
    if let Some(key) = conditional.filter(|key| !fields.contains_key(*key)) {
        debug!("{key} argument missing");
        return Err(bad_request(INVALID_KEY));
    }
    Ok(())
}

/// Printable ASCII only, 1 to 256 bytes.
fn valid_user_id(user_id: &str) -> bool {
    (1..=MAX_USER_ID_LEN).contains(&user_id.len())
        && user_id.bytes().all(|b| (b' '..=b'~').contains(&b))
}

fn valid_expire_time(expire_time: &str) -> bool {
    expire_time.len() == EXPIRE_TIME_LEN
        && expire_time
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'T' | b'Z' | b':'))
}

fn validate(request: &VerifyRequest) -> Result<(), Error> {
    if !valid_user_id(&request.user_id) {
        return Err(Error::Forbidden(INVALID_USER_ID.to_string()));
    }
    if !is_hex(&request.mpin_id) {
        return Err(bad_request("BAD REQUEST. INVALID MPIN ID"));
    }
    if !valid_expire_time(&request.expire_time) {
        return Err(bad_request("BAD REQUEST. INVALID EXPIRE TIME"));
    }
    // The activate key ends up in the mailed link whatever the device.
    let key = &request.activate_key;
    if !(key.is_empty() || key.len() == ACTIVATE_KEY_LEN) || !is_hex(key) {
        return Err(bad_request("BAD REQUEST. INVALID ACTIVATEKEY"));
    }
    match request.mobile {
        1 => {}
        0 => {
            if request.activation_code.to_string().len() > MAX_ACTIVATION_CODE_DIGITS {
                return Err(bad_request("BAD REQUEST. INVALID ACTIVATIONCODE"));
            }
        }
        _ => return Err(bad_request("BAD REQUEST. INVALID MOBILE")),
    }
    Ok(())
}

/// Activation page URL, rebased onto `RPS-BASE-URL` when the configured URL
/// is relative.
fn activation_base_url(verify_identity_url: &str, req: &Incoming) -> String {
    let rps_base = req
        .headers()
        .get(RPS_BASE_URL)
        .and_then(|value| value.to_str().ok());
    match rps_base {
        Some(base) if verify_identity_url.starts_with('/') => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            verify_identity_url.trim_start_matches('/')
        ),
        _ => verify_identity_url.to_string(),
    }
}

/// Check the user against the directory and mail the activation link or code.
///
/// # Errors
/// [`Error::Forbidden`] when the directory has no such user and directory
/// errors are shown, [`Error::Internal`] when the directory is unreachable.
/// An unknown user with directory errors hidden is accepted without mail.
pub async fn verify_identity(
    ctx: &RequestContext,
    req: &Incoming,
    request: &VerifyRequest,
) -> Result<(), Error> {
    let config = ctx.app.config();
    let base_url = activation_base_url(config.verify_identity_url(), req);

    if config.force_activate() {
        warn!(user_id = %request.user_id, "force-activate set, identity activated without verification");
        return Ok(());
    }

    if let Some(directory) = ctx.app.directory() {
        let entries = directory
            .count_entries(&request.user_id)
            .await
            .map_err(Error::Internal)?;
        if entries == 0 {
            warn!(user_id = %request.user_id, "user not found in directory");
            if config.show_directory_errors() {
                return Err(Error::Forbidden(INVALID_USER_ID.to_string()));
            }
            return Ok(());
        }
    }

    let mailer = ctx.app.mailer();
    if !request.activate_key.is_empty() {
        let validate_url = format!(
            "{base_url}?i={}&e={}&s={}",
            request.mpin_id, request.expire_time, request.activate_key
        );
        debug!(user_id = %request.user_id, "sending activation link");
        if let Err(err) = mailer
            .send_activation_link(&request.user_id, device_name(request.mobile), &validate_url)
            .await
        {
            error!(user_id = %request.user_id, "Failed to send activation link: {err:#}");
        }
    }
    if request.activation_code != 0 {
        debug!(user_id = %request.user_id, "sending activation code");
        if let Err(err) = mailer
            .send_activation_code(&request.user_id, device_name(0), request.activation_code)
            .await
        {
            error!(user_id = %request.user_id, "Failed to send activation code: {err:#}");
        }
    }
    Ok(())
}

/// # Errors
/// Validation failures as 400/403, directory failures from [`verify_identity`].
pub async fn verify_user(
    ctx: &mut RequestContext,
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    let fields = json_object(&req.body)?;
    check_keys(&fields)?;

    let request: VerifyRequest =
        serde_json::from_value(Value::Object(fields)).map_err(|err| {
            debug!("Invalid verify request: {err}");
            bad_request(INVALID_JSON)
        })?;
    ctx.user_id.clone_from(&request.user_id);

    validate(&request)?;

    verify_identity(ctx, req, &request).await?;

    res.write_json(&VerifyResponse {
        force_activate: ctx.app.config().force_activate(),
    })?;
    Ok(StatusCode::OK)
}
