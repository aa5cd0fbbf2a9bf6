//! # Errors
//!
//! Two layers:
//! - [`JoyError`]: a structured, status-carrying error that rides inside
//!   `anyhow::Error` through the request handler and is turned into an HTTP
//!   status/message at the handler boundary.
//! - [`ConfigError`]: build-time route configuration failures. These are
//!   raised while routes are declared and never travel over the wire.

use std::fmt;

use anyhow::Error as AnyError;
use thiserror::Error;

/// Convenience result for the handler pipeline.
pub type JoyResult<T> = std::result::Result<T, AnyError>;

/// Result type for route configuration.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Status classes the handler can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    NotFound,         // 404
    GeneralError,     // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::GeneralError => 500,
        }
    }
}

/// A structured error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct JoyError {
    pub kind: ErrorKind,
    pub message: String,
    pub source: Option<AnyError>,
}

impl JoyError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Convert into `anyhow::Error` so it flows through the handler pipeline.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `JoyError` anywhere in an `anyhow::Error` chain.
    pub fn from_anyhow(err: &AnyError) -> Option<&JoyError> {
        err.chain().find_map(|e| e.downcast_ref::<JoyError>())
    }

    /// Turn any error into a JoyError:
    /// - if it's already a JoyError, keep it
    /// - if one sits behind contexts, take its status and message
    /// - otherwise wrap it with the given fallback kind
    pub fn normalize(err: AnyError, fallback: ErrorKind) -> JoyError {
        match err.downcast::<JoyError>() {
            Ok(joy) => joy,
            Err(other) => {
                let found = JoyError::from_anyhow(&other).map(JoyError::sanitize_for_client);
                match found {
                    Some(joy) => joy.with_source(other),
                    None => JoyError::new(fallback, other.to_string()).with_source(other),
                }
            }
        }
    }

    /// Copy without the inner `source`, safe to hand to clients.
    pub fn sanitize_for_client(&self) -> JoyError {
        JoyError {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for JoyError {
    // Only the message: it is what ends up in plain-text responses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for JoyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Bail out of a handler step with a JoyError.
#[macro_export]
macro_rules! bail_joy {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::JoyError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::JoyError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}

/// Errors raised while declaring routes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid file size format: {input}")]
    InvalidFileSizeFormat { input: String },

    #[error("Duplicate route slug: {slug}")]
    DuplicateSlug { slug: String },
}

impl ConfigError {
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn file_size<S: Into<String>>(input: S) -> Self {
        Self::InvalidFileSizeFormat {
            input: input.into(),
        }
    }

    pub fn duplicate_slug<S: Into<String>>(slug: S) -> Self {
        Self::DuplicateSlug { slug: slug.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joy_error_survives_anyhow_context() {
        let err = JoyError::not_found("no route").into_anyhow().context("while dispatching");
        let found = JoyError::from_anyhow(&err).map(|e| e.code());
        assert_eq!(found, Some(404));
    }

    #[test]
    fn normalize_wraps_foreign_errors() {
        let joy = JoyError::normalize(anyhow::anyhow!("bad json"), ErrorKind::BadRequest);
        assert_eq!(joy.code(), 400);
        assert_eq!(joy.message, "bad json");
        assert!(joy.sanitize_for_client().source.is_none());
    }

    #[test]
    fn normalize_keeps_status_behind_context() {
        let err = JoyError::not_authenticated("Invalid signature")
            .into_anyhow()
            .context("while verifying");
        let joy = JoyError::normalize(err, ErrorKind::BadRequest);
        assert_eq!(joy.code(), 401);
        assert_eq!(joy.message, "Invalid signature");
    }
}
