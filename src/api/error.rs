//! Stage errors and their HTTP mapping.

use axum::http::StatusCode;
use thiserror::Error;

/// Failure returned by a pipeline stage.
///
/// Every variant maps to a status of 400 or above, so returning one from a
/// stage always aborts the chain.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or forbidden request shape or field content.
    #[error("{0}")]
    BadRequest(String),
    /// Identity content rejected, or the directory denied the user.
    #[error("{0}")]
    Forbidden(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    NotFound(String),
    /// Failure status handed back by the RPS, reported as is.
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    /// Directory, RPS, template or encoding failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Status { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body written to the client when this error aborts a request.
    ///
    /// Only validation messages are echoed back; everything else gets the
    /// canonical status text so internal details never leak.
    #[must_use]
    pub fn public_body(&self) -> String {
        let status = self.status();
        match status {
            StatusCode::NOT_FOUND => "404 page not found".to_string(),
            StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN => self.to_string(),
            _ => status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
        }
    }
}

pub(crate) fn bad_request(message: &str) -> Error {
    Error::BadRequest(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(Error::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Internal(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Status {
                status: StatusCode::UNAUTHORIZED,
                message: "Invalid PIN".into()
            }
            .status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn public_body_hides_internal_details() {
        assert_eq!(
            Error::Internal(anyhow!("ldap bind failed: secret dn")).public_body(),
            "Internal Server Error"
        );
        assert_eq!(
            Error::NotFound("Page not found".into()).public_body(),
            "404 page not found"
        );
        assert_eq!(
            bad_request("BAD REQUEST. INVALID KEY").public_body(),
            "BAD REQUEST. INVALID KEY"
        );
        assert_eq!(
            Error::Forbidden("BAD REQUEST. INVALID USER ID".into()).public_body(),
            "BAD REQUEST. INVALID USER ID"
        );
        assert_eq!(
            Error::MethodNotAllowed.public_body(),
            "Method Not Allowed"
        );
    }
}
