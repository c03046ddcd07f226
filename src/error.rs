use std::fmt;

/// Failures while establishing the portal session.
#[derive(Debug)]
pub enum AuthError {
    LoginFailed(String),
    PageFetchFailed(String),
    TokenNotFound,
    Timeout,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::LoginFailed(msg) => write!(f, "login failed: {msg}"),
            AuthError::PageFetchFailed(msg) => write!(f, "control page fetch failed: {msg}"),
            AuthError::TokenNotFound => write!(f, "token not found in control page"),
            AuthError::Timeout => write!(f, "authentication timed out"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Failures of a status read or a set command.
#[derive(Debug)]
pub enum GatewayError {
    Auth(AuthError),
    EmptyResponse,
    InvalidBody(String),
    Status(u16),
    Unauthorized,
    WriteFailed(u16),
    Timeout,
    Http(reqwest::Error),
}

impl GatewayError {
    /// Whether the next scheduled cycle can reasonably expect a different outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Auth(_)
                | GatewayError::Unauthorized
                | GatewayError::Timeout
                | GatewayError::Http(_)
        )
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Auth(e) => write!(f, "auth error: {e}"),
            GatewayError::EmptyResponse => write!(f, "empty response from portal"),
            GatewayError::InvalidBody(msg) => write!(f, "invalid response body: {msg}"),
            GatewayError::Status(code) => write!(f, "unexpected HTTP status {code}"),
            GatewayError::Unauthorized => write!(f, "token rejected by portal"),
            GatewayError::WriteFailed(code) => write!(f, "write failed with HTTP status {code}"),
            GatewayError::Timeout => write!(f, "request timed out"),
            GatewayError::Http(e) => write!(f, "HTTP error: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Auth(e) => Some(e),
            GatewayError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(e: AuthError) -> Self {
        GatewayError::Auth(e)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Http(e)
        }
    }
}

#[derive(Debug)]
pub enum PersistenceError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Corrupt(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "IO error: {e}"),
            PersistenceError::Json(e) => write!(f, "JSON error: {e}"),
            PersistenceError::Corrupt(msg) => write!(f, "corrupt persisted state: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io(e) => Some(e),
            PersistenceError::Json(e) => Some(e),
            PersistenceError::Corrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Json(e)
    }
}

#[derive(Debug)]
pub enum Error {
    Config(String),
    Yaml(serde_yaml::Error),
    Io(std::io::Error),
    Http(reqwest::Error),
    Gateway(GatewayError),
    Persistence(PersistenceError),
    SetpointOutOfRange(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Yaml(e) => write!(f, "YAML error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Gateway(e) => write!(f, "gateway error: {e}"),
            Error::Persistence(e) => write!(f, "persistence error: {e}"),
            Error::SetpointOutOfRange(t) => write!(f, "setpoint out of range: {t}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Yaml(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Gateway(e) => Some(e),
            Error::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Yaml(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<GatewayError> for Error {
    fn from(e: GatewayError) -> Self {
        Error::Gateway(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Gateway(GatewayError::Auth(e))
    }
}

impl From<PersistenceError> for Error {
    fn from(e: PersistenceError) -> Self {
        Error::Persistence(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
