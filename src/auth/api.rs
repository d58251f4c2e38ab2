//! HTTP client for the hosting app's auth endpoints.
//!
//! The backend endpoints are opaque collaborators: `_dash-login` accepts the
//! access token and sets the session cookie, `_is-authorized` reports 200 or
//! 403. A shared cookie jar stands in for the browser's "credentials
//! included" behavior so both cookies travel on every call.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{CSRF_COOKIE_NAME, IS_AUTHORIZED_PATHNAME, LOGIN_PATHNAME};
use crate::config::{AuthConfig, Location};

/// Header carrying the CSRF token read from the [`CSRF_COOKIE_NAME`] cookie.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Outcome of a settled backend request: HTTP status plus the parsed JSON
/// body, if any. A body that is not valid JSON is kept as a raw string so
/// it can still be surfaced verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRequest {
    pub status: u16,
    pub body: Option<Value>,
}

#[derive(Serialize)]
struct SessionExchangeBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

pub struct ApiClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    /// Origin plus pathname prefix; all endpoint paths append to this.
    base: Url,
}

impl ApiClient {
    pub fn new(location: &Location, auth: &AuthConfig) -> Result<Self> {
        let base = Url::parse(&format!(
            "{}{}",
            location.origin, auth.requests_pathname_prefix
        ))
        .context("Invalid app origin or pathname prefix")?;

        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, jar, base })
    }

    fn endpoint(&self, pathname: &str) -> String {
        // The prefix convention carries its own trailing slash, so endpoint
        // paths concatenate directly.
        format!("{}{}", self.base, pathname)
    }

    /// GET the app root so the jar picks up the CSRF cookie the backend
    /// seeds when serving pages. A browser client gets this for free.
    pub async fn prime(&self) -> Result<(), reqwest::Error> {
        self.http.get(self.base.clone()).send().await?;
        Ok(())
    }

    /// Seed a cookie into the jar, e.g. a CSRF token captured from an
    /// existing browser session.
    pub fn add_cookie(&self, cookie: &str) {
        self.jar.add_cookie_str(cookie, &self.base);
    }

    /// Value of the CSRF cookie, if the jar holds one for the app.
    pub fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        let cookies = header.to_str().ok()?;
        cookie_value(cookies, CSRF_COOKIE_NAME)
    }

    /// POST the access token to the session-exchange endpoint.
    ///
    /// Any HTTP status settles into an `Ok(CompletedRequest)`; only a
    /// network-level failure is an `Err`. The token field is omitted from
    /// the body when the redirect fragment carried none.
    pub async fn exchange_session(
        &self,
        access_token: Option<&str>,
    ) -> Result<CompletedRequest, reqwest::Error> {
        let mut request = self
            .http
            .post(self.endpoint(LOGIN_PATHNAME))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&SessionExchangeBody { access_token });
        if let Some(token) = self.csrf_token() {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(text) if !text.is_empty() => match serde_json::from_str::<Value>(&text) {
                Ok(json) => Some(json),
                Err(_) => Some(Value::String(text)),
            },
            _ => None,
        };
        Ok(CompletedRequest { status, body })
    }

    /// GET the authorization-check endpoint. 200 means authorized, 403
    /// means the logged-in user may not view this app.
    pub async fn check_authorization(&self) -> Result<u16, reqwest::Error> {
        let mut request = self
            .http
            .get(self.endpoint(IS_AUTHORIZED_PATHNAME))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.csrf_token() {
            request = request.header(CSRF_HEADER, token);
        }
        Ok(request.send().await?.status().as_u16())
    }
}

/// Pull one value out of a `name=value; name2=value2` cookie header.
fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
