//! One-shot notices carried to the next page in a short-lived cookie.

use axum::http::HeaderMap;
use url::form_urlencoded;

use crate::auth::{CookieSettings, get_cookie};

pub const FLASH_COOKIE_NAME: &str = "flash_message";

/// Seconds a notice survives if no page picks it up.
const FLASH_MAX_AGE: u64 = 60;

pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please login again.";

/// Attach a notice to the response.
pub fn set_flash(headers: &mut HeaderMap, cookies: &CookieSettings, message: &str) {
    let value = form_urlencoded::Serializer::new(String::new())
        .append_pair("msg", message)
        .finish();
    cookies.set_plain(headers, FLASH_COOKIE_NAME, &value, FLASH_MAX_AGE);
}

/// Expire the notice cookie.
pub fn clear_flash(headers: &mut HeaderMap, cookies: &CookieSettings) {
    cookies.set_plain(headers, FLASH_COOKIE_NAME, "", 0);
}

/// Read the pending notice from the request, if any.
pub fn read_flash(headers: &HeaderMap) -> Option<String> {
    let raw = get_cookie(headers, FLASH_COOKIE_NAME)?;
    form_urlencoded::parse(raw.as_bytes())
        .find(|(key, _)| key == "msg")
        .map(|(_, value)| value.into_owned())
        .filter(|message| !message.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    #[test]
    fn test_flash_survives_cookie_round_trip() {
        let mut response = HeaderMap::new();
        set_flash(&mut response, &CookieSettings::default(), SESSION_EXPIRED_NOTICE);

        let set_cookie = response.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("flash_message=msg="));
        assert!(set_cookie.contains("Max-Age=60"));
        assert!(!set_cookie.contains("HttpOnly"));

        let pair = set_cookie.split(';').next().unwrap();
        assert!(!pair.contains(' '));
        let mut request = HeaderMap::new();
        request.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());

        assert_eq!(read_flash(&request).as_deref(), Some(SESSION_EXPIRED_NOTICE));
    }

    #[test]
    fn test_cleared_flash_reads_as_none() {
        let mut request = HeaderMap::new();
        request.insert(header::COOKIE, HeaderValue::from_static("flash_message="));
        assert_eq!(read_flash(&request), None);
        assert_eq!(read_flash(&HeaderMap::new()), None);
    }
}
