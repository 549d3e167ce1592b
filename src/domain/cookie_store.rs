use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use cookie::Cookie;
use reqwest::Url;
use reqwest::header::HeaderValue;

/// One `name=value` pair received in a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        SessionCookie { name: name.into(), value: value.into() }
    }

    /// Parses the `name=value` pair of a `Set-Cookie` header. Attributes
    /// (`Path`, `HttpOnly`, `Expires`, ...) are dropped.
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let cookie = Cookie::parse(header).ok()?;
        Some(SessionCookie::new(cookie.name(), cookie.value()))
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Host-keyed cookie jar for a single job submission.
///
/// Recording for a host replaces whatever was stored for it. There is no
/// expiry and no path scoping.
#[derive(Debug, Default)]
pub struct CookieStore {
    cookies: Mutex<HashMap<String, Vec<SessionCookie>>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, host: &str, cookies: Vec<SessionCookie>) {
        let mut guard = self.cookies.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(host.to_string(), cookies);
    }

    pub fn retrieve(&self, host: &str) -> Vec<SessionCookie> {
        let guard = self.cookies.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(host).cloned().unwrap_or_default()
    }

    /// Host key of a URL: the host plus an explicit port, if any.
    pub fn host_key(url: &Url) -> String {
        let host = url.host_str().unwrap_or_default();
        match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

impl reqwest::cookie::CookieStore for CookieStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies: Vec<SessionCookie> =
            cookie_headers.filter_map(|header| header.to_str().ok()).filter_map(SessionCookie::parse_set_cookie).collect();

        if cookies.is_empty() {
            return;
        }
        self.record(&Self::host_key(url), cookies);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let cookies = self.retrieve(&Self::host_key(url));
        if cookies.is_empty() {
            return None;
        }

        let header = cookies.iter().map(|cookie| cookie.to_string()).collect::<Vec<_>>().join("; ");
        HeaderValue::from_str(&header).ok()
    }
}
