//! The uniform value every handler returns.
//!
//! An [`ActionResult`] is the only currency that moves through the middleware
//! chain: handlers create it, middleware and response filters may replace it
//! on the way out, and the [`ResponseNegotiator`](crate::ResponseNegotiator)
//! consumes it exactly once.
//!
//! It is a value type. Every `with_*` method takes `self` and returns the
//! changed copy; clone first when the original must survive.
//!
//! ```rust
//! use portico::{ActionResult, Status};
//! use serde_json::json;
//!
//! let found = ActionResult::success()
//!     .with_value("id", json!(5))
//!     .with_message("ok");
//! let missing = ActionResult::fail("Widget not found").with_status(Status::NotFound);
//!
//! assert_eq!(found.status_code(), 200);
//! assert_eq!(missing.status_code(), 404);
//! assert!(ActionResult::new("maybe", "").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::status::Status;

/// The three canonical result states.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Fail,
    Error,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail    => "fail",
            Self::Error   => "error",
        }
    }
}

impl FromStr for ResultStatus {
    type Err = Error;

    /// Exact, lowercase match only: `"Success"` is as invalid as `"maybe"`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(Self::Success),
            "fail"    => Ok(Self::Fail),
            "error"   => Ok(Self::Error),
            other     => Err(Error::InvalidStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state handler result: status, payload, message, status code and the
/// optional template / redirect intents.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionResult {
    status: ResultStatus,
    data: Map<String, Value>,
    message: String,
    status_code: u16,
    template: Option<String>,
    redirect: Option<String>,
    headers: Vec<(String, String)>,
}

impl ActionResult {
    /// Builds a result from a status name.
    ///
    /// Fails with [`Error::InvalidStatus`] for anything but `success`, `fail`
    /// or `error`. This is a contract check on the calling code, independent
    /// of any request.
    pub fn new(status: &str, message: impl Into<String>) -> Result<Self> {
        Ok(Self::with_result_status(status.parse()?, message))
    }

    pub fn with_result_status(status: ResultStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            data: Map::new(),
            message: message.into(),
            status_code: Status::Ok.into(),
            template: None,
            redirect: None,
            headers: Vec::new(),
        }
    }

    pub fn success() -> Self {
        Self::with_result_status(ResultStatus::Success, "")
    }

    /// An expected, user-facing failure (validation, business rule, not found).
    pub fn fail(message: impl Into<String>) -> Self {
        Self::with_result_status(ResultStatus::Fail, message)
    }

    /// A server-side failure reported to the client.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_result_status(ResultStatus::Error, message)
    }

    /// Success that sends the client elsewhere, `302 Found` unless changed.
    pub fn redirect_to(location: impl Into<String>) -> Self {
        Self::success()
            .with_redirect(location)
            .with_status(Status::Found)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn status(&self) -> ResultStatus { self.status }
    pub fn data(&self) -> &Map<String, Value> { &self.data }
    pub fn message(&self) -> &str { &self.message }
    pub fn status_code(&self) -> u16 { self.status_code }
    pub fn template(&self) -> Option<&str> { self.template.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// The redirect target, ignoring an empty string.
    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref().filter(|r| !r.is_empty())
    }

    pub fn is_success(&self) -> bool { self.status == ResultStatus::Success }

    // ── Copy-on-write modifiers ───────────────────────────────────────────────

    pub fn with_status(mut self, code: impl Into<u16>) -> Self {
        self.status_code = code.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Replaces the whole payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Sets one payload key, keeping the rest.
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_redirect(mut self, location: impl Into<String>) -> Self {
        self.redirect = Some(location.into());
        self
    }

    /// Adds a response header (e.g. `Allow`, `Cache-Control`).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_status_fails_at_construction() {
        for bad in ["maybe", "Success", "", "ok"] {
            let err = ActionResult::new(bad, "x").unwrap_err();
            assert!(matches!(err, Error::InvalidStatus(ref s) if s == bad));
        }
        assert_eq!(ActionResult::new("fail", "nope").unwrap().status(), ResultStatus::Fail);
    }

    #[test]
    fn defaults_to_200_without_template_or_redirect() {
        let result = ActionResult::error("boom");
        assert_eq!(result.status_code(), 200);
        assert_eq!(result.template(), None);
        assert_eq!(result.redirect(), None);
    }

    #[test]
    fn modifiers_leave_the_original_untouched() {
        let base = ActionResult::success().with_value("id", json!(1));
        let changed = base.clone().with_value("id", json!(2)).with_status(Status::Created);

        assert_eq!(base.data()["id"], json!(1));
        assert_eq!(base.status_code(), 200);
        assert_eq!(changed.data()["id"], json!(2));
        assert_eq!(changed.status_code(), 201);
    }

    #[test]
    fn empty_redirect_is_no_redirect() {
        assert_eq!(ActionResult::success().with_redirect("").redirect(), None);
        let moved = ActionResult::redirect_to("/login");
        assert_eq!(moved.redirect(), Some("/login"));
        assert_eq!(moved.status_code(), 302);
    }
}
