//! Per-request trace line.

use std::time::{Duration, Instant};

use tracing::{info, info_span};

use crate::error::Result;
use crate::middleware::{Middleware, Next, Options};
use crate::request::Request;
use crate::result::ActionResult;

/// Opens a `request` span around the rest of the chain and logs one `info`
/// line with method, path, status and latency when it completes. The span
/// carries the peer address when the request came over a socket.
///
/// Failures are left to the dispatcher, which logs them exactly once.
/// Option `label` adds a free-form field, e.g. the API area.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn handle(&self, req: &mut Request, options: &Options, next: Next<'_>) -> Result<ActionResult> {
        let label = options.get("label").and_then(|v| v.as_str()).unwrap_or("");
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.path(),
            peer = req.remote_addr().map(tracing::field::display),
            label
        );
        let _entered = span.enter();

        let started = Instant::now();
        let result = next.run(req)?;
        info!(
            status = result.status_code(),
            outcome = %result.status(),
            latency_us = micros(started.elapsed()),
            "request completed"
        );
        Ok(result)
    }
}

/// Whole microseconds, saturating at `u64::MAX`.
fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}
