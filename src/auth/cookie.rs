//! Session cookie reading and writing.
//!
//! The access and refresh cookies are always written as a pair: both header
//! values are built first and only appended if both are valid.

use axum::http::{HeaderMap, HeaderValue, header};
use tracing::error;

use crate::jwt::TokenPair;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}

/// True if the response headers already set a cookie with this name.
pub fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers.get_all(header::SET_COOKIE).iter().any(|value| {
        value
            .to_str()
            .ok()
            .and_then(|v| v.split_once('='))
            .is_some_and(|(key, _)| key.trim() == name)
    })
}

/// SameSite policy for session cookies.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Security attributes shared by every cookie the server writes.
#[derive(Clone, Copy, Debug)]
pub struct CookieSettings {
    secure: bool,
    same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::new(false, SameSite::default())
    }
}

impl CookieSettings {
    /// Browsers reject `SameSite=None` without `Secure`, so it is forced on.
    pub fn new(secure: bool, same_site: SameSite) -> Self {
        Self {
            secure: secure || same_site == SameSite::None,
            same_site,
        }
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    fn header_value(&self, name: &str, value: &str, max_age: u64, http_only: bool) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite={}",
            name,
            value,
            max_age,
            self.same_site.as_str()
        );
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        match HeaderValue::from_str(&cookie) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(cookie = %name, error = %e, "Invalid cookie value");
                None
            }
        }
    }

    /// Set a script-readable cookie (used for flash notices).
    pub fn set_plain(&self, headers: &mut HeaderMap, name: &str, value: &str, max_age: u64) {
        if let Some(value) = self.header_value(name, value, max_age, false) {
            headers.append(header::SET_COOKIE, value);
        }
    }

    /// Set both session cookies. Max-Age is each token's remaining lifetime.
    pub fn issue(&self, headers: &mut HeaderMap, pair: &TokenPair) {
        let access = self.header_value(
            ACCESS_COOKIE_NAME,
            &pair.access.token,
            pair.access.remaining_secs(),
            true,
        );
        let refresh = self.header_value(
            REFRESH_COOKIE_NAME,
            &pair.refresh.token,
            pair.refresh.remaining_secs(),
            true,
        );
        if let (Some(access), Some(refresh)) = (access, refresh) {
            headers.append(header::SET_COOKIE, access);
            headers.append(header::SET_COOKIE, refresh);
        }
    }

    /// Expire both session cookies, whether or not the client has them.
    pub fn clear(&self, headers: &mut HeaderMap) {
        let access = self.header_value(ACCESS_COOKIE_NAME, "", 0, true);
        let refresh = self.header_value(REFRESH_COOKIE_NAME, "", 0, true);
        if let (Some(access), Some(refresh)) = (access, refresh) {
            headers.append(header::SET_COOKIE, access);
            headers.append(header::SET_COOKIE, refresh);
        }
    }
}
