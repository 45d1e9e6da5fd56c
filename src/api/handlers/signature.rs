//! Activation link payload.
//!
//! An activation link carries three query parameters: `i` is the identity
//! (hex-encoded JSON `{"userID", "issued", "mobile"}`), `e` the expiry in
//! RFC 3339 form and `s` the activation key. Decoding never fails: a broken
//! link yields an invalid [`Signature`] carrying the reason.

use chrono::{NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

const ISSUED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// `02 Jan 06 15:04 -0700`
const HUMAN_ISSUED_FORMAT: &str = "%d %b %y %H:%M %z";

pub const INVALID_IDENTITY: &str = "Invalid identity";
pub const INVALID_ISSUE_TIME: &str = "Invalid issue time";
pub const LINK_EXPIRED: &str = "Link expired";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub is_valid: bool,
    pub identity: String,
    pub error_message: String,
    pub user_id: String,
    pub issued: String,
    pub human_issued: String,
    pub activated: bool,
    pub device_name: String,
    pub activate_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityPayload {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub issued: String,
    #[serde(default)]
    pub mobile: i64,
}

impl IdentityPayload {
    /// Hex form used as the `i` parameter.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_vec(self).map(hex::encode)
    }

    fn decode(identity: &str) -> Option<Self> {
        let bytes = hex::decode(identity).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[must_use]
pub fn device_name(mobile: i64) -> &'static str {
    if mobile == 0 {
        "PC"
    } else {
        "Mobile"
    }
}

impl Signature {
    /// Decode the link parameters and check the link against the current time.
    #[must_use]
    pub fn decode(identity: &str, expires: &str, activate_key: &str) -> Self {
        let mut signature = Self {
            identity: identity.to_string(),
            activate_key: activate_key.to_string(),
            ..Self::default()
        };

        let Some(payload) = IdentityPayload::decode(identity) else {
            return signature.invalid(INVALID_IDENTITY);
        };
        // Kept even for broken links so the failure can be attributed.
        signature.user_id = payload.user_id;

        let Ok(issued) = NaiveDateTime::parse_from_str(&payload.issued, ISSUED_FORMAT) else {
            return signature.invalid(INVALID_ISSUE_TIME);
        };
        if signature.user_id.is_empty() {
            return signature.invalid(INVALID_IDENTITY);
        }

        signature.issued = payload.issued;
        signature.human_issued = issued.and_utc().format(HUMAN_ISSUED_FORMAT).to_string();
        signature.device_name = device_name(payload.mobile).to_string();

        // Both sides are RFC 3339 in UTC with second precision, so string
        // order is time order.
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        if expires < now.as_str() {
            signature.error_message = LINK_EXPIRED.to_string();
        } else {
            signature.is_valid = true;
        }
        signature
    }

    fn invalid(mut self, reason: &str) -> Self {
        self.is_valid = false;
        self.error_message = reason.to_string();
        self.device_name.clear();
        self.issued.clear();
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn identity(user_id: &str, issued: &str, mobile: i64) -> String {
        IdentityPayload {
            user_id: user_id.to_string(),
            issued: issued.to_string(),
            mobile,
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn valid_link() {
        let i = hex::encode(r#"{"userID":"foo","issued":"2000-01-01 00:00:00","mobile":0}"#);
        let signature = Signature::decode(&i, "2100-01-01T00:00:00Z", "KEY");
        assert!(signature.is_valid);
        assert_eq!(signature.user_id, "foo");
        assert_eq!(signature.device_name, "PC");
        assert_eq!(signature.human_issued, "01 Jan 00 00:00 +0000");
        assert_eq!(signature.issued, "2000-01-01 00:00:00");
        assert_eq!(signature.activate_key, "KEY");
        assert_eq!(signature.identity, i);
        assert!(signature.error_message.is_empty());
        assert!(!signature.activated);
    }

    #[test]
    fn expired_link() {
        let i = hex::encode(r#"{"userID":"foo","issued":"2000-01-01 00:00:00","mobile":0}"#);
        let signature = Signature::decode(&i, "2000-01-01T00:00:00Z", "KEY");
        assert!(!signature.is_valid);
        assert_eq!(signature.error_message, "Link expired");
        assert_eq!(signature.device_name, "PC");
    }

    #[test]
    fn mobile_device() {
        let signature = Signature::decode(
            &identity("bar@example.com", "2015-06-30 12:34:56", 1),
            "2100-01-01T00:00:00Z",
            "",
        );
        assert!(signature.is_valid);
        assert_eq!(signature.device_name, "Mobile");
        assert_eq!(signature.human_issued, "30 Jun 15 12:34 +0000");
    }

    #[test]
    fn broken_identity_is_invalid() {
        let not_json = hex::encode("not json");
        for i in ["zz", "", not_json.as_str()] {
            let signature = Signature::decode(i, "2100-01-01T00:00:00Z", "");
            assert!(!signature.is_valid);
            assert_eq!(signature.error_message, INVALID_IDENTITY);
            assert!(signature.user_id.is_empty());
        }
    }

    #[test]
    fn empty_user_is_invalid() {
        let signature = Signature::decode(
            &identity("", "2000-01-01 00:00:00", 0),
            "2100-01-01T00:00:00Z",
            "",
        );
        assert!(!signature.is_valid);
        assert_eq!(signature.error_message, INVALID_IDENTITY);
        assert!(signature.device_name.is_empty());
    }

    #[test]
    fn bad_issue_time_is_invalid() {
        let signature = Signature::decode(
            &identity("foo", "2000-01-01T00:00:00Z", 0),
            "2100-01-01T00:00:00Z",
            "",
        );
        assert!(!signature.is_valid);
        assert_eq!(signature.error_message, INVALID_ISSUE_TIME);
        assert_eq!(signature.user_id, "foo");
        assert!(signature.issued.is_empty());
    }
}
