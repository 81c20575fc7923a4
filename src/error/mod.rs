//! Error types for chansync.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors fall into four categories:
//! - **Network**: connection, timeout, or HTTP-level failures against an
//!   upstream pricing endpoint or the gateway API
//! - **Configuration**: config file parsing, missing gateway credentials,
//!   invalid CLI argument combinations
//! - **Gateway**: the gateway accepted the request but reported failure in
//!   its response envelope
//! - **Storage/Internal**: local database failures and unclassified errors

use thiserror::Error;

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Configuration problem (bad config file, missing credentials)
    ConfigError = 2,
    /// Parse/format errors in upstream or gateway responses
    ParseError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for chansync operations.
#[derive(Error, Debug)]
pub enum ChansyncError {
    // ==========================================================================
    // Network errors
    // ==========================================================================
    /// Request timed out after the configured duration.
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Generic network failure (DNS, connection refused, non-2xx status).
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but could not be decoded.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Invalid configuration value or file.
    #[error("configuration error: {0}")]
    Config(String),

    /// The gateway base URL or token is missing.
    #[error("gateway not configured: set gateway_url and gateway_token in config.toml or CHANSYNC_GATEWAY_URL / CHANSYNC_GATEWAY_TOKEN")]
    GatewayNotConfigured,

    /// Unknown upstream provider name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Unknown price group name.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// Unknown price feed schema name.
    #[error("unknown price schema: {0} (expected flat, grouped, columns, or group-price)")]
    UnknownSchema(String),

    // ==========================================================================
    // Gateway errors
    // ==========================================================================
    /// The gateway returned success=false in its response envelope.
    #[error("gateway rejected request: {0}")]
    Gateway(String),

    // ==========================================================================
    // Storage / internal errors
    // ==========================================================================
    /// Local SQLite failure.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped unclassified error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChansyncError {
    /// Map this error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Timeout(_) => ExitCode::Timeout,
            Self::ParseResponse(_) => ExitCode::ParseError,
            Self::Config(_)
            | Self::GatewayNotConfigured
            | Self::UnknownProvider(_)
            | Self::UnknownGroup(_)
            | Self::UnknownSchema(_) => ExitCode::ConfigError,
            Self::Network(_)
            | Self::Gateway(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }
}

impl From<rusqlite::Error> for ChansyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Convenience result alias.
pub type Result<T, E = ChansyncError> = std::result::Result<T, E>;
