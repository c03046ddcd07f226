use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::AuthError;
use crate::logger::{SharedLogger, with_logger};
use crate::protocol::{self, Endpoints, FORM_CONTENT_TYPE};
use crate::types::Credentials;

/// Tokens older than this are refreshed before use.
pub const TOKEN_MAX_AGE_SECS: i64 = 3600;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone, Default)]
struct Session {
    token: Option<String>,
    token_issued_at: Option<DateTime<Utc>>,
}

impl Session {
    fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let issued = self.token_issued_at?;
        if now - issued > TimeDelta::seconds(TOKEN_MAX_AGE_SECS) {
            return None;
        }
        self.token.as_deref()
    }
}

/// Owns the cookie-bearing HTTP client and the scraped portal token for one device.
pub struct SessionManager {
    http: reqwest::Client,
    endpoints: Endpoints,
    credentials: Credentials,
    session: Mutex<Session>,
    clock: Clock,
    logger: Option<SharedLogger>,
}

impl SessionManager {
    pub(crate) fn new(
        http: reqwest::Client,
        endpoints: Endpoints,
        credentials: Credentials,
        clock: Clock,
        logger: Option<SharedLogger>,
    ) -> Self {
        Self {
            http,
            endpoints,
            credentials,
            session: Mutex::new(Session::default()),
            clock,
            logger,
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn logger(&self) -> &Option<SharedLogger> {
        &self.logger
    }

    pub fn device_id(&self) -> &str {
        &self.credentials.device_id
    }

    /// Return the cached token, logging in again when it is missing or older
    /// than an hour.
    ///
    /// The session lock is held for the whole refresh, so concurrent callers
    /// wait for the in-flight login and then reuse its token. A failed refresh
    /// keeps the previous token in place.
    pub async fn ensure_valid_session(&self) -> Result<String, AuthError> {
        let mut session = self.session.lock().await;
        let now = (self.clock)();
        if let Some(token) = session.valid_token(now) {
            return Ok(token.to_string());
        }

        debug!(device = %self.credentials.device_id, "no token or token expired, logging in");
        let token = self.login().await?;
        let issued_at = (self.clock)();
        session.token = Some(token.clone());
        session.token_issued_at = Some(issued_at);
        info!(device = %self.credentials.device_id, %issued_at, "got new token");
        Ok(token)
    }

    /// Drop the cached token so the next call logs in again.
    pub async fn invalidate(&self) {
        let mut session = self.session.lock().await;
        session.token_issued_at = None;
    }

    pub async fn token_issued_at(&self) -> Option<DateTime<Utc>> {
        self.session.lock().await.token_issued_at
    }

    async fn login(&self) -> Result<String, AuthError> {
        let form = protocol::login_form(&self.credentials.username, &self.credentials.password);
        let url = self.endpoints.login();
        debug!(url = %url, user = %self.credentials.username, "requesting new token");
        with_logger(&self.logger, |l| l.log_request("POST", &url, &form));

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .form(&form[..])
            .send()
            .await
            .map_err(|e| auth_transport_error(e, AuthError::LoginFailed))?;
        let status = resp.status();
        if !(status.is_success() || status.is_redirection()) {
            error!(status = status.as_u16(), "login failed");
            return Err(AuthError::LoginFailed(format!("HTTP {}", status.as_u16())));
        }

        let url = self.endpoints.control();
        let query = protocol::control_query(&self.credentials.device_id);
        with_logger(&self.logger, |l| l.log_request("GET", &url, &query));

        let resp = self
            .http
            .get(&url)
            .query(&query[..])
            .send()
            .await
            .map_err(|e| auth_transport_error(e, AuthError::PageFetchFailed))?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "control page fetch failed");
            return Err(AuthError::PageFetchFailed(format!("HTTP {}", status.as_u16())));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| auth_transport_error(e, AuthError::PageFetchFailed))?;

        protocol::extract_token(&html).ok_or_else(|| {
            error!(snippet = %protocol::snippet(&html), "could not parse token from control page");
            AuthError::TokenNotFound
        })
    }
}

fn auth_transport_error(e: reqwest::Error, wrap: fn(String) -> AuthError) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else {
        wrap(e.to_string())
    }
}
