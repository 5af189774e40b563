//! Response filters.
//!
//! Filters run after the middleware chain has produced its final
//! [`ActionResult`] and before negotiation, in the route's registration
//! order. Unlike middleware they cannot stop the handler from running; they
//! only rewrite its result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::middleware::{FilterDef, Options};
use crate::request::Request;
use crate::result::ActionResult;

/// Rewrites a finished result.
pub trait ResponseFilter: Send + Sync + 'static {
    fn apply(&self, req: &Request, result: ActionResult, options: &Options) -> Result<ActionResult>;
}

impl<F> ResponseFilter for F
where
    F: Fn(&Request, ActionResult, &Options) -> Result<ActionResult> + Send + Sync + 'static,
{
    fn apply(&self, req: &Request, result: ActionResult, options: &Options) -> Result<ActionResult> {
        self(req, result, options)
    }
}

/// Filter instances by id. Filled at boot, read-only afterwards.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    entries: HashMap<String, Arc<dyn ResponseFilter>>,
}

impl FilterRegistry {
    pub fn register(&mut self, id: impl Into<String>, filter: impl ResponseFilter) {
        self.entries.insert(id.into(), Arc::new(filter));
    }

    pub fn get(&self, id: &str) -> Result<&dyn ResponseFilter> {
        self.entries
            .get(id)
            .map(|f| f.as_ref())
            .ok_or_else(|| Error::UnknownFilter(id.to_owned()))
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Runs `defs` over `result` in order.
pub fn apply_filters(
    registry: &FilterRegistry,
    defs: &[FilterDef],
    req: &Request,
    result: ActionResult,
) -> Result<ActionResult> {
    defs.iter().try_fold(result, |result, def| {
        registry.get(def.id())?.apply(req, result, def.options())
    })
}

/// Adds every string option as a response header.
///
/// ```rust
/// use portico::FilterDef;
/// use serde_json::json;
///
/// let no_store = FilterDef::new("headers").with("cache-control", json!("no-store"));
/// # let _ = no_store;
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct SetHeaders;

impl ResponseFilter for SetHeaders {
    fn apply(&self, _req: &Request, result: ActionResult, options: &Options) -> Result<ActionResult> {
        Ok(options
            .iter()
            .filter_map(|(name, value)| value.as_str().map(|v| (name, v)))
            .fold(result, |result, (name, value)| result.with_header(name.as_str(), value)))
    }
}
