//! Emit pipeline error types.

use std::fmt;
use std::io;

/// Error codes.
pub mod codes {
    pub const PKG_ARGS_INVALID: &str = "PKG_ARGS_INVALID";
    pub const PKG_ENTRY_SCAN_FAILED: &str = "PKG_ENTRY_SCAN_FAILED";
    pub const PKG_TRACE_FAILED: &str = "PKG_TRACE_FAILED";
    pub const PKG_CACHE_ERROR: &str = "PKG_CACHE_ERROR";
    pub const PKG_CLASSIFY_FAILED: &str = "PKG_CLASSIFY_FAILED";
    pub const PKG_LINK_FAILED: &str = "PKG_LINK_FAILED";
    pub const NODE_MODULES_WRITE_FAILED: &str = "NODE_MODULES_WRITE_FAILED";
    pub const PKG_PACKAGE_JSON_WRITE_FAILED: &str = "PKG_PACKAGE_JSON_WRITE_FAILED";
    pub const PKG_INTERNAL: &str = "PKG_INTERNAL";
}

/// Emit pipeline error.
#[derive(Debug, Clone)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn args_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_ARGS_INVALID, msg)
    }

    pub fn entry_scan_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_ENTRY_SCAN_FAILED, msg)
    }

    pub fn trace_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_TRACE_FAILED, msg)
    }

    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, msg)
    }

    pub fn classify_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CLASSIFY_FAILED, msg)
    }

    pub fn link_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LINK_FAILED, msg)
    }

    /// Create a `node_modules` write failed error.
    pub fn node_modules_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::NODE_MODULES_WRITE_FAILED, msg)
    }

    pub fn package_json_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_PACKAGE_JSON_WRITE_FAILED, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_INTERNAL, msg)
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::NODE_MODULES_WRITE_FAILED, e.to_string())
    }
}

impl From<tokio::task::JoinError> for PkgError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(format!("Background task failed: {e}"))
    }
}
