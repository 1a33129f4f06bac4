//! Error taxonomy for the gateway.
//!
//! Two families: [`ConfigError`] is fatal and only produced while the process
//! starts; [`GatewayError`] is produced per call and always carries an
//! [`ErrorKind`] so callers can tell a local policy denial from a backend
//! failure.

use std::fmt;

use serde::Serialize;

/// Startup configuration errors. These abort the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration '{key}' for the {environment} environment")]
    MissingRequired { key: String, environment: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Denied by the local write policy; nothing was sent upstream.
    WriteBlocked,
    /// Invalid or expired credential.
    AuthError,
    /// Backend access-control exception. Ambiguous: it may mean a missing
    /// capability or a function absent from the service definition.
    PermissionDenied,
    /// Backend rejected a parameter name or shape.
    InvalidParameter,
    /// Connection refused, DNS failure or timeout.
    NetworkError,
    /// Any other backend error, preserved verbatim.
    UpstreamUnknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::WriteBlocked => "write_blocked",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::UpstreamUnknown => "upstream_unknown",
        }
    }

    /// Short human label used in rendered diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::WriteBlocked => "Write blocked by local policy",
            ErrorKind::AuthError => "Authentication failed",
            ErrorKind::PermissionDenied => "Backend access exception",
            ErrorKind::InvalidParameter => "Invalid parameter",
            ErrorKind::NetworkError => "Network error",
            ErrorKind::UpstreamUnknown => "Backend error",
        }
    }

    /// True for kinds reported by the backend (or the path to it), false for
    /// local policy decisions.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, ErrorKind::WriteBlocked)
    }

    /// Only network failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::NetworkError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified per-call failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw backend debug string, kept unmodified.
    pub debug_info: Option<String>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            debug_info: None,
        }
    }

    pub fn with_debug_info(mut self, debug_info: impl Into<String>) -> Self {
        let debug_info = debug_info.into();
        if !debug_info.is_empty() {
            self.debug_info = Some(debug_info);
        }
        self
    }

    pub fn write_blocked(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::WriteBlocked, reason)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }
}
