//! Session cookie encoding on top of raw `Cookie`/`Set-Cookie` headers.

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::warn;

use super::error::Error;

/// Expiry used to force client-side deletion. Epoch zero is not a valid
/// `Expires` value, so one second past the epoch is used.
const CLEARED_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:01 GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            secure: false,
            http_only: false,
        }
    }

    #[must_use]
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    fn header_value(&self) -> String {
        let mut cookie = format!("{}={}; Path=/", self.name, self.value);
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Extract the named cookie value from the request headers.
///
/// `secure_required` does not change extraction: browsers already withhold
/// `Secure` cookies from plain-text requests.
///
/// # Errors
/// [`Error::NotFound`] when no cookie with that name is present.
pub fn read_secure_cookie(
    headers: &HeaderMap,
    name: &str,
    _secure_required: bool,
) -> Result<String, Error> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .ok_or_else(|| Error::NotFound(format!("cookie {name} not present")))
}

/// Emit `Set-Cookie` with both `Secure` and `HttpOnly` forced to `secure`.
pub fn write_secure_cookie(headers: &mut HeaderMap, mut cookie: Cookie, secure: bool) {
    cookie.secure = secure;
    cookie.http_only = secure;
    append_set_cookie(headers, &cookie.header_value());
}

/// Emit an already-expired cookie so the client drops it.
pub fn clear_cookie(headers: &mut HeaderMap, name: &str) {
    append_set_cookie(headers, &format!("{name}=; Expires={CLEARED_EXPIRES}"));
}

fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(err) => warn!("Dropping invalid Set-Cookie header: {err}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn read_finds_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; rpa_session=ABC-123 ; lang=en"),
        );
        assert_eq!(
            read_secure_cookie(&headers, "rpa_session", true).unwrap(),
            "ABC-123"
        );
        assert_eq!(read_secure_cookie(&headers, "lang", false).unwrap(), "en");
    }

    #[test]
    fn read_missing_cookie_is_not_found() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            read_secure_cookie(&headers, "rpa_session", false),
            Err(Error::NotFound(_))
        ));
        headers.insert(COOKIE, HeaderValue::from_static("other=1"));
        assert!(matches!(
            read_secure_cookie(&headers, "rpa_session", false),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn write_insecure_cookie_clears_flags() {
        let mut headers = HeaderMap::new();
        let mut cookie = Cookie::new("rpa_session", "SID").with_max_age(14400);
        cookie.secure = true;
        cookie.http_only = true;
        write_secure_cookie(&mut headers, cookie, false);
        assert_eq!(
            set_cookies(&headers),
            vec!["rpa_session=SID; Path=/; Max-Age=14400"]
        );
    }

    #[test]
    fn write_secure_cookie_sets_flags() {
        let mut headers = HeaderMap::new();
        write_secure_cookie(
            &mut headers,
            Cookie::new("rpa_session", "SID").with_max_age(60),
            true,
        );
        assert_eq!(
            set_cookies(&headers),
            vec!["rpa_session=SID; Path=/; Max-Age=60; HttpOnly; Secure"]
        );
    }

    #[test]
    fn clear_cookie_expires_one_second_after_epoch() {
        let mut headers = HeaderMap::new();
        write_secure_cookie(&mut headers, Cookie::new("keep", "1"), false);
        clear_cookie(&mut headers, "rpa_session");
        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(
            cookies[1],
            "rpa_session=; Expires=Thu, 01 Jan 1970 00:00:01 GMT"
        );
    }
}
