//! Unified error type.
//!
//! Expected, user-facing outcomes (not found, validation failures, business
//! rule violations) are never `Error`s: handlers return them as
//! [`ActionResult::fail`](crate::ActionResult::fail) values. This type covers
//! boot-time configuration mistakes and the infrastructure or programmer
//! failures that the [`Dispatcher`](crate::Dispatcher) converts at its single
//! catch point.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by portico's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    // ── Boot time ─────────────────────────────────────────────────────────────
    /// An [`ActionResult`](crate::ActionResult) status outside
    /// `success | fail | error`.
    #[error("invalid result status `{0}` (expected success, fail or error)")]
    InvalidStatus(String),

    #[error("unknown HTTP method `{0}`")]
    UnknownMethod(String),

    #[error("route `{method} {path}` is already registered")]
    DuplicateRoute { method: String, path: String },

    #[error("invalid route `{path}`: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("config: {0}")]
    Config(String),

    // ── Dispatch-time configuration defects ──────────────────────────────────
    /// A handler parameter that no binding source could satisfy.
    #[error("missing argument `{param}` for handler `{handler}` on route `{route}`")]
    MissingArgument {
        param: String,
        handler: String,
        route: String,
    },

    #[error("no handler registered for `{0}`")]
    UnresolvedHandler(String),

    #[error("no middleware registered under id `{0}`")]
    UnknownMiddleware(String),

    #[error("no response filter registered under id `{0}`")]
    UnknownFilter(String),

    #[error("no entity repository registered for kind `{0}`")]
    UnknownEntity(String),

    // ── Unhandled ─────────────────────────────────────────────────────────────
    /// A failure raised by application code (handler, middleware, filter,
    /// repository, template engine).
    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A panic caught at the dispatcher boundary.
    #[error("panicked: {0}")]
    Panic(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps any application error so it can be returned with `?` from a
    /// handler or middleware.
    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Handler(err.into())
    }

    /// Configuration and programmer defects: always logged with full
    /// handler/route context, never a user-facing condition.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::MissingArgument { .. }
                | Self::UnresolvedHandler(_)
                | Self::UnknownMiddleware(_)
                | Self::UnknownFilter(_)
                | Self::UnknownEntity(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_argument_names_param_handler_and_route() {
        let err = Error::MissingArgument {
            param: "id".into(),
            handler: "widgets.show".into(),
            route: "GET /widgets/{id}".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing argument `id` for handler `widgets.show` on route `GET /widgets/{id}`"
        );
        assert!(err.is_defect());
    }

    #[test]
    fn handler_errors_keep_their_source() {
        let err = Error::handler("database unavailable");
        assert_eq!(err.to_string(), "handler failed: database unavailable");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_defect());
    }
}
