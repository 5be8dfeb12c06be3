//! Access/refresh cookies bound to the domains of a token's audience.

use crate::tokens::{self, issuer::peek_claims};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use url::Url;

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Added to each cookie's lifetime past the token expiry.
pub const EXPIRY_BUFFER_SECONDS: i64 = 60;

/// Domains that may receive cookies over plain HTTP.
const INSECURE_HOST: &str = "localhost";
const PRIVATE_SUFFIXES: [&str; 3] = [".local", ".localhost", ".internal"];

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Token(#[from] tokens::Error),
    #[error("audience entry {0:?} has no host")]
    Audience(String),
    #[error("token has no audience")]
    NoAudience,
    #[error("invalid cookie value")]
    Header(#[from] InvalidHeaderValue),
}

#[derive(Debug, Clone)]
pub struct CookieManager {
    buffer: Duration,
}

impl Default for CookieManager {
    fn default() -> Self {
        Self {
            buffer: Duration::seconds(EXPIRY_BUFFER_SECONDS),
        }
    }
}

impl CookieManager {
    #[must_use]
    pub fn new(buffer: Duration) -> Self {
        Self { buffer }
    }

    /// Append access and refresh cookies for every audience domain of the
    /// access token. Claims are read without a signature check: the tokens
    /// must come straight from local issuance.
    ///
    /// Either every cookie is appended or none is.
    ///
    /// # Errors
    /// Returns an error for malformed tokens or audience entries.
    pub fn set_auth_cookies(
        &self,
        headers: &mut HeaderMap,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), Error> {
        self.set_auth_cookies_at(headers, access_token, refresh_token, Utc::now())
    }

    /// # Errors
    /// See [`CookieManager::set_auth_cookies`].
    pub fn set_auth_cookies_at(
        &self,
        headers: &mut HeaderMap,
        access_token: &str,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let access = peek_claims(access_token)?;
        let refresh = peek_claims(refresh_token)?;
        if access.aud.is_empty() {
            return Err(Error::NoAudience);
        }

        let access_max_age = self.max_age(access.exp, now);
        let refresh_max_age = self.max_age(refresh.exp, now);

        let mut cookies = Vec::with_capacity(access.aud.len() * 2);
        for domain in cookie_domains(&access.aud)? {
            cookies.push(build_cookie(
                ACCESS_COOKIE_NAME,
                access_token,
                &domain,
                access_max_age,
                true,
            )?);
            cookies.push(build_cookie(
                REFRESH_COOKIE_NAME,
                refresh_token,
                &domain,
                refresh_max_age,
                false,
            )?);
        }
        for cookie in cookies {
            headers.append(SET_COOKIE, cookie);
        }
        Ok(())
    }

    /// Expire both cookies on every domain derived from `audience`.
    ///
    /// # Errors
    /// Returns an error for audience entries without a host.
    pub fn clear_auth_cookies(&self, headers: &mut HeaderMap, audience: &[String]) -> Result<(), Error> {
        let mut cookies = Vec::with_capacity(audience.len() * 2);
        for domain in cookie_domains(audience)? {
            cookies.push(build_cookie(ACCESS_COOKIE_NAME, "", &domain, 0, true)?);
            cookies.push(build_cookie(REFRESH_COOKIE_NAME, "", &domain, 0, false)?);
        }
        for cookie in cookies {
            headers.append(SET_COOKIE, cookie);
        }
        Ok(())
    }

    fn max_age(&self, expires_at: i64, now: DateTime<Utc>) -> i64 {
        (expires_at - now.timestamp() + self.buffer.num_seconds()).max(0)
    }
}

/// Whether a cookie for `domain` may be sent without `Secure`.
#[must_use]
pub fn insecure_allowed(domain: &str) -> bool {
    domain == INSECURE_HOST || PRIVATE_SUFFIXES.iter().any(|suffix| domain.ends_with(suffix))
}

/// One cookie domain per audience entry, in order, without duplicates.
///
/// # Errors
/// Returns `Error::Audience` for an entry that is neither a URL with a host
/// nor a bare host name.
pub fn cookie_domains(audience: &[String]) -> Result<Vec<String>, Error> {
    let mut domains: Vec<String> = Vec::with_capacity(audience.len());
    for aud in audience {
        let domain = match Url::parse(aud) {
            Ok(url) => url.host_str().map(str::to_string),
            Err(_) => Some(aud.trim().to_string()).filter(|host| valid_host(host)),
        }
        .ok_or_else(|| Error::Audience(aud.clone()))?;
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    Ok(domains)
}

fn valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn build_cookie(
    name: &str,
    value: &str,
    domain: &str,
    max_age: i64,
    http_only: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Domain={domain}; Path=/; Max-Age={max_age}; SameSite=Lax");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if !insecure_allowed(domain) {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Value of cookie `name` from the request `Cookie` headers.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
