//! Minimal cookie jar for credentialed admin sessions.
//!
//! The admin backend authenticates with a session cookie set by `/login`.
//! Only name/value pairs are kept; the jar is scoped to one API origin, so
//! `Domain` and `Path` attributes are ignored. A cookie is dropped when the
//! server clears it (`Max-Age=0` or an empty value).

use std::collections::BTreeMap;

use crate::http::HttpResponse;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieStore {
    cookies: BTreeMap<String, String>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Record every `Set-Cookie` header of `response`.
    pub fn absorb(&mut self, response: &HttpResponse) {
        for raw in response.header_values("set-cookie") {
            self.apply_set_cookie(raw);
        }
    }

    pub fn apply_set_cookie(&mut self, raw: &str) {
        let mut attrs = raw.split(';');
        let Some((name, value)) = attrs.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        let value = value.trim().trim_matches('"');
        if name.is_empty() {
            return;
        }
        let expired = attrs.any(|attr| {
            attr.split_once('=')
                .map(|(k, v)| k.trim().eq_ignore_ascii_case("max-age") && v.trim() == "0")
                .unwrap_or(false)
        });
        if expired || value.is_empty() {
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), value.to_string());
        }
    }

    /// Value for a `cookie` request header, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbs_session_cookie_and_ignores_attributes() {
        let mut jar = CookieStore::new();
        let resp = HttpResponse::new(200, "{}")
            .with_header("Set-Cookie", "admin_session=abc123; Path=/; HttpOnly; SameSite=Lax");
        jar.absorb(&resp);
        assert_eq!(jar.get("admin_session"), Some("abc123"));
        assert_eq!(jar.header_value().as_deref(), Some("admin_session=abc123"));
    }

    #[test]
    fn max_age_zero_removes_cookie() {
        let mut jar = CookieStore::new();
        jar.apply_set_cookie("sid=1");
        jar.apply_set_cookie("sid=deleted; Max-Age=0");
        assert!(jar.is_empty());
        assert_eq!(jar.header_value(), None);
    }

    #[test]
    fn multiple_cookies_join_in_stable_order() {
        let mut jar = CookieStore::new();
        jar.apply_set_cookie("b=2");
        jar.apply_set_cookie("a=1");
        assert_eq!(jar.header_value().as_deref(), Some("a=1; b=2"));
    }

    #[test]
    fn malformed_header_is_ignored() {
        let mut jar = CookieStore::new();
        jar.apply_set_cookie("garbage");
        jar.apply_set_cookie("=novalue");
        assert!(jar.is_empty());
    }
}
