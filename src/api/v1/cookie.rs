use crate::application_port::SessionTokens;
use crate::settings::{Cookie, SameSite};
use std::time::Duration;
use tracing::error;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::reply::Response;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Formats the two session cookies. Both are `HttpOnly; Path=/`; lifetime
/// follows the credential they carry.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    domain: Option<String>,
    secure: bool,
    same_site: SameSite,
    access_max_age: u64,
    refresh_max_age: u64,
}

impl CookiePolicy {
    pub fn new(cookie: &Cookie, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        CookiePolicy {
            domain: cookie.domain.clone().filter(|d| !d.is_empty()),
            secure: cookie.secure,
            same_site: cookie.same_site,
            access_max_age: access_ttl.as_secs(),
            refresh_max_age: refresh_ttl.as_secs(),
        }
    }

    fn format(&self, name: &str, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite={}; Path=/; Max-Age={}",
            name, value, self.same_site, max_age
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn access(&self, token: &str) -> String {
        self.format(ACCESS_COOKIE, token, self.access_max_age)
    }

    pub fn refresh(&self, token: &str) -> String {
        self.format(REFRESH_COOKIE, token, self.refresh_max_age)
    }

    pub fn cleared(&self) -> [String; 2] {
        [
            self.format(ACCESS_COOKIE, "", 0),
            self.format(REFRESH_COOKIE, "", 0),
        ]
    }

    pub fn issued(&self, tokens: &SessionTokens) -> [String; 2] {
        [
            self.access(&tokens.access_token),
            self.refresh(&tokens.refresh_token),
        ]
    }

    /// Appends one `Set-Cookie` header per cookie.
    pub fn apply(&self, response: &mut Response, cookies: [String; 2]) {
        let headers = response.headers_mut();
        for cookie in cookies {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => error!(error = %e, "cookie is not a valid header value"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_settings(domain: Option<&str>, secure: bool, same_site: SameSite) -> Cookie {
        Cookie {
            domain: domain.map(str::to_string),
            secure,
            same_site,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }

    #[test]
    fn test_access_cookie_attributes() {
        let policy = CookiePolicy::new(
            &cookie_settings(None, false, SameSite::Lax),
            Duration::from_secs(900),
            Duration::from_secs(2_592_000),
        );

        assert_eq!(
            policy.access("abc"),
            "accessToken=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=900"
        );
        assert_eq!(
            policy.refresh("xyz"),
            "refreshToken=xyz; HttpOnly; SameSite=Lax; Path=/; Max-Age=2592000"
        );
    }

    #[test]
    fn test_domain_and_secure_are_appended() {
        let policy = CookiePolicy::new(
            &cookie_settings(Some("cocktail.example.com"), true, SameSite::Strict),
            Duration::from_secs(900),
            Duration::from_secs(60),
        );

        assert_eq!(
            policy.refresh("xyz"),
            "refreshToken=xyz; HttpOnly; SameSite=Strict; Path=/; Max-Age=60; \
             Domain=cocktail.example.com; Secure"
        );
    }

    #[test]
    fn test_cleared_cookies_expire_immediately() {
        let policy = CookiePolicy::new(
            &cookie_settings(Some(""), false, SameSite::Lax),
            Duration::from_secs(900),
            Duration::from_secs(60),
        );

        let [access, refresh] = policy.cleared();
        assert_eq!(access, "accessToken=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
        assert_eq!(refresh, "refreshToken=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    }
}
