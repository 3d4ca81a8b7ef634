//! Error taxonomy.
//!
//! Errors are split by how the process reacts to them:
//!
//! - **Fatal at start**: [`ConfigError`], [`GameDataError`], [`AuthError`],
//!   [`ResolveError::NotFound`], [`ConnectError::Refused`]. Collected into
//!   [`FatalError`] and turned into a non-zero exit by `main`.
//! - **Retryable**: [`ResolveError::Transient`], [`ConnectError::Failed`].
//! - **Session-recoverable**: [`TransportError`] raised while a session is
//!   connecting or active. The session is torn down and the reconnect loop
//!   starts a fresh attempt.

use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure to open the transport link.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The remote end actively refused the connection. Never retried.
    #[error("connection refused by {0}")]
    Refused(String),
    /// Any other connect failure (DNS, TLS, handshake rejected...).
    #[error("connect failed: {0}")]
    Failed(String),
}

/// Fault on an established link.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link closed")]
    Closed,
    #[error("transport fault: {0}")]
    Fault(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Host address resolution failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The target definitively does not exist. Fatal.
    #[error("{0}")]
    NotFound(String),
    /// The lookup service failed in a way that may succeed later.
    #[error("{0}")]
    Transient(String),
}

/// Failure to determine the primary-event identifier for a protocol version.
#[derive(Debug, Error)]
pub enum GameDataError {
    #[error("unsupported version '{0}'")]
    UnsupportedVersion(String),
    #[error("no data for version {0}; check the version or wait for the data to be published")]
    NotPublished(String),
    #[error("unexpected response from data endpoint: {0}")]
    Malformed(String),
    #[error("failed to fetch identifier for version {version} after {attempts} attempt(s)")]
    Exhausted { version: String, attempts: u32 },
}

/// Failure to obtain usable credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to write profile {path}: {source}")]
    WriteProfile {
        path: String,
        source: std::io::Error,
    },
    #[error("authentication request failed: {0}")]
    Request(String),
    #[error("authentication rejected: {0}")]
    Rejected(String),
    #[error("no valid token in profile and AUTOFISH_PASSWORD is not set")]
    MissingPassword,
}

/// Every condition that ends the process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    GameData(#[from] GameDataError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("host resolution failed: {0}")]
    Resolve(ResolveError),
    #[error(transparent)]
    Connect(ConnectError),
}
