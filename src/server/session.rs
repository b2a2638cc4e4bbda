//! Session cookie handling
//!
//! Sessions are an opaque id carried in a cookie. There is no server-side
//! session table; expiry is the cookie's `Max-Age`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::SessionConfig;

/// Session id presented by the client, if any.
pub fn session_from_jar<'a>(jar: &'a CookieJar, config: &SessionConfig) -> Option<&'a str> {
    jar.get(&config.cookie_name).map(|cookie| cookie.value())
}

/// Session cookie to (re)set on the response.
pub fn session_cookie(config: &SessionConfig, session_id: String) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    if let Some(max_age) = config.max_age {
        let secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        cookie.set_max_age(time::Duration::seconds(secs));
    }
    cookie
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{header, HeaderMap, HeaderValue};

    use super::*;

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc-123; other=x"),
        );
        let jar = CookieJar::from_headers(&headers);
        let config = SessionConfig::default();
        assert_eq!(session_from_jar(&jar, &config), Some("abc-123"));

        let other = SessionConfig {
            cookie_name: "missing".to_string(),
            ..SessionConfig::default()
        };
        assert_eq!(session_from_jar(&jar, &other), None);
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie(&SessionConfig::default(), "abc".to_string());
        assert_eq!(cookie.name(), "session_id");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(2_592_000)));

        let browser_session = SessionConfig {
            max_age: None,
            ..SessionConfig::default()
        };
        assert_eq!(session_cookie(&browser_session, "abc".to_string()).max_age(), None);

        let short = SessionConfig {
            max_age: Some(Duration::from_secs(60)),
            ..SessionConfig::default()
        };
        let rendered = session_cookie(&short, "abc".to_string()).to_string();
        assert!(rendered.starts_with("session_id=abc"));
        assert!(rendered.contains("Max-Age=60"));
    }
}
