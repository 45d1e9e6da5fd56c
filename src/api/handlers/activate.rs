//! Activation page (`GET|POST /mpinActivate?i=..&e=..&s=..`).
//!
//! GET shows the decoded link; POST on a valid link asks the RPS to activate
//! the identity. The link fields may also arrive as a urlencoded POST form. The page is rendered with 200 whatever the link state.

use axum::http::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info};

use super::signature::Signature;
use crate::api::{
    error::Error,
    pipeline::{Incoming, Outgoing, RequestContext},
};

#[derive(Serialize)]
struct ActivatePage<'a> {
    static_url_base: &'a str,
    valid: bool,
    activated: bool,
    user_id: &'a str,
    human_issued: &'a str,
    device_name: &'a str,
    error_message: &'a str,
    user: &'a str,
}

/// # Errors
/// [`Error::Internal`] only when the page cannot be rendered.
pub async fn activate(
    ctx: &mut RequestContext,
    req: &Incoming,
    res: &mut Outgoing,
) -> Result<StatusCode, Error> {
    let mut signature = Signature::decode(
        &req.form_param("i"),
        &req.form_param("e"),
        &req.form_param("s"),
    );
    ctx.user_id.clone_from(&signature.user_id);

    if signature.is_valid {
        debug!(user_id = %signature.user_id, "activation link accepted");
    } else {
        info!(
            user_id = %signature.user_id,
            reason = %signature.error_message,
            "activation link rejected"
        );
    }

    if req.method() == Method::POST && signature.is_valid {
        match ctx
            .app
            .rps()
            .activate_user(&signature.identity, &signature.activate_key)
            .await
        {
            Ok(()) => signature.activated = true,
            Err(err) => error!(user_id = %signature.user_id, "{err:#}"),
        }
    }

    let page = ActivatePage {
        static_url_base: ctx.app.config().static_url_base(),
        valid: signature.is_valid,
        activated: signature.activated,
        user_id: &signature.user_id,
        human_issued: &signature.human_issued,
        device_name: &signature.device_name,
        error_message: &signature.error_message,
        user: &ctx.logged_user,
    };
    let html = ctx.app.templates().render("activate", &page)?;
    res.write_html(html);
    Ok(StatusCode::OK)
}
