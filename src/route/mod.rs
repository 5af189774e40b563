//! Route registration and matching.
//!
//! [`RouteTable`] collects [`RouteDefinition`]s at boot, [`Router`] freezes it
//! together with a [`PathMatcher`] strategy and answers every request with
//! exactly one [`RouteMatch`].

mod matcher;
mod router;
mod table;

use std::fmt;

pub use matcher::{ExactMatcher, MatchStrategy, PathMatcher, PatternMatch, SegmentMatcher, TrieMatcher};
pub use router::{RouteMatch, Router};
pub use table::RouteTable;

use crate::handler::HandlerRef;
use crate::method::Method;
use crate::middleware::{FilterDef, MiddlewareDef};

/// One registered route. Immutable once the table has accepted it.
#[derive(Clone, Debug)]
pub struct RouteDefinition {
    method: Method,
    path: String,
    handler: HandlerRef,
    middlewares: Vec<MiddlewareDef>,
    filters: Vec<FilterDef>,
}

impl RouteDefinition {
    pub(crate) fn new(
        method: Method,
        path: String,
        handler: HandlerRef,
        middlewares: Vec<MiddlewareDef>,
        filters: Vec<FilterDef>,
    ) -> Self {
        Self { method, path, handler, middlewares, filters }
    }

    pub fn method(&self) -> Method { self.method }

    /// Normalized pattern, group prefixes included.
    pub fn path(&self) -> &str { &self.path }

    pub fn handler(&self) -> &HandlerRef { &self.handler }

    /// Group middleware outer-to-inner, then the route's own.
    pub fn middlewares(&self) -> &[MiddlewareDef] { &self.middlewares }

    /// Group filters outer-to-inner, then the route's own.
    pub fn filters(&self) -> &[FilterDef] { &self.filters }
}

impl fmt::Display for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Collapses repeated slashes, drops the trailing slash, ensures exactly one
/// leading slash. The empty path and `"/"` both normalize to `"/"`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}
