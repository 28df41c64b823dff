//! Error types for the host status probe subsystem

use std::io;
use thiserror::Error;

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the probe pipeline.
///
/// These are the errors that propagate out of a probe call via `?`. Outcomes
/// the pipeline treats as ordinary negative results — a refused dial, a read
/// timeout, a socket that went away mid-run — are represented as plain
/// `bool`/enum values at the call site, not as `Error` variants, since those
/// are expected and locally recovered rather than exceptional.
#[derive(Error, Debug)]
pub enum Error {
    /// Target failed RFC 1123 DNS-label validation.
    #[error("invalid target {0:?}")]
    InvalidTarget(String),

    /// Shell tokenization failed, or the rendered template had no tokens.
    #[error("invalid command template: {0}")]
    InvalidTemplate(String),

    /// Non-zero exit, spawn failure, or timeout while running a subprocess.
    #[error("subprocess failed: {0}")]
    SubprocessFailure(String),

    /// Neither a raw nor an unprivileged ICMP socket could be opened.
    #[error("no ICMP socket available: {0}")]
    SocketUnavailable(String),

    /// Configuration failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors with automatic conversion.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation exceeded its deadline.
    #[error("operation timed out")]
    Timeout,
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("TOML parse error: {err}"))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(format!("TOML serialization error: {err}"))
    }
}
