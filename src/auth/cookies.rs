use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

fn session_cookie(name: &str, value: &str, max_age: Option<i64>) -> HeaderValue {
    let mut cookie = format!("{}={}; HttpOnly; Secure; SameSite=Lax; Path=/", name, value);
    if let Some(secs) = max_age {
        cookie.push_str(&format!("; Max-Age={}", secs));
    }
    // token values are base64url and dots, always valid header bytes
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` headers for a freshly issued pair.
pub fn set_session_cookies(access_token: &str, refresh_token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, session_cookie(ACCESS_COOKIE, access_token, None));
    headers.append(SET_COOKIE, session_cookie(REFRESH_COOKIE, refresh_token, None));
    headers
}

/// `Set-Cookie` headers that expire both session cookies.
pub fn clear_session_cookies() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, session_cookie(ACCESS_COOKIE, "", Some(0)));
    headers.append(SET_COOKIE, session_cookie(REFRESH_COOKIE, "", Some(0)));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; accessToken=abc.def; x=1"));
        assert_eq!(cookie_value(&headers, ACCESS_COOKIE), Some("abc.def"));
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE), None);
    }

    #[test]
    fn empty_cookie_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refreshToken="));
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE), None);
    }

    #[test]
    fn session_cookies_are_http_only_and_secure() {
        let headers = set_session_cookies("a.b.c", "d.e.f");
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("accessToken=a.b.c;"));
        assert!(cookies[1].starts_with("refreshToken=d.e.f;"));
        assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("Secure")));
    }

    #[test]
    fn clearing_sets_zero_max_age() {
        let headers = clear_session_cookies();
        assert!(headers
            .get_all(SET_COOKIE)
            .iter()
            .all(|v| v.to_str().unwrap().ends_with("Max-Age=0")));
    }
}
