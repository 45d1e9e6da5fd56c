//! # RPA (Relying-Party Application)
//!
//! `rpa` is the browser-facing front end of a multi-factor identity relying
//! party. It keeps lightweight in-memory sessions, runs every HTTP request
//! through an ordered chain of stages, and drives the identity
//! verify/activate/authenticate protocol against a remote Relying-Party
//! Server (RPS).
//!
//! ## Sessions
//!
//! Sessions live in a process-wide [`api::session::SessionStore`] guarded by a
//! single reader/writer lock. Expiry is enforced when a session is read; a
//! write counter triggers a full sweep of expired entries every 1000 writes.
//!
//! ## Request pipeline
//!
//! Each route is bound to a [`api::pipeline::Pipeline`]: base headers,
//! session resolution, a method guard and the route handler. The first stage
//! that fails with a status of 400 or above aborts the chain and its error is
//! written as the response.
//!
//! ## Identity protocol
//!
//! - **Verify:** validates the RPS identity request, optionally checks the
//!   user in an LDAP directory, and mails an activation link or code.
//! - **Activate:** decodes the signed activation link and asks the RPS to
//!   activate the identity.
//! - **Authenticate:** forwards the one-time token to the RPS, reports the
//!   login result and binds the authenticated user to the session.
//!
//! This service never stores or verifies cryptographic secrets; it only
//! carries opaque tokens and session identifiers.

pub mod api;
pub mod cli;
pub mod directory;
pub mod mail;
pub mod rps;
pub mod tls;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
