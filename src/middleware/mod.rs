//! Middleware layer.
//!
//! Middleware wraps everything inside it: it sees the request on the way in,
//! the [`ActionResult`] on the way out, and may answer on its own without
//! delegating. It is the right place for cross-cutting concerns: tracing,
//! authentication, request annotation, result decoration.
//!
//! ```text
//!   global[0] ─▶ global[1] ─▶ route[0] ─▶ handler
//!   global[0] ◀─ global[1] ◀─ route[0] ◀─┘
//! ```
//!
//! Each layer gets a [`Next`]. Calling [`Next::run`] delegates inward; not
//! calling it short-circuits. `run` consumes the `Next`, so a layer can
//! delegate at most once.
//!
//! Routes name middleware by id through a [`MiddlewareDef`]; the instance is
//! looked up in the [`MiddlewareRegistry`] when the chain is built for a
//! request, so registries and routes can be filled in any order at boot.

mod filter;
mod trace;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::request::Request;
use crate::result::ActionResult;

pub use filter::{FilterRegistry, ResponseFilter, SetHeaders, apply_filters};
pub use trace::Trace;

/// Free-form configuration attached to a middleware or filter reference.
pub type Options = Map<String, Value>;

// ── Definitions ───────────────────────────────────────────────────────────────

/// An id into a registry plus the options to run it with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Definition {
    id: String,
    options: Options,
}

/// Reference to a registered [`Middleware`].
pub type MiddlewareDef = Definition;

/// Reference to a registered [`ResponseFilter`].
pub type FilterDef = Definition;

impl Definition {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), options: Options::new() }
    }

    /// Adds one option.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn options(&self) -> &Options { &self.options }
}

impl From<&str> for Definition {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// One layer of the onion.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: &mut Request, options: &Options, next: Next<'_>) -> Result<ActionResult>;
}

/// Closure-backed [`Middleware`]. Build with [`from_fn`].
pub struct FromFn<F>(F);

/// Turns a closure into middleware.
///
/// ```rust
/// use portico::{ActionResult, Status, middleware};
///
/// let require_user = middleware::from_fn(|req, _options, next| {
///     if req.header("x-user").is_none() {
///         return Ok(ActionResult::fail("Sign in first").with_status(Status::Unauthorized));
///     }
///     next.run(req)
/// });
/// # let _ = require_user;
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&mut Request, &Options, Next<'_>) -> Result<ActionResult> + Send + Sync + 'static,
{
    FromFn(f)
}

impl<F> Middleware for FromFn<F>
where
    F: Fn(&mut Request, &Options, Next<'_>) -> Result<ActionResult> + Send + Sync + 'static,
{
    fn handle(&self, req: &mut Request, options: &Options, next: Next<'_>) -> Result<ActionResult> {
        (self.0)(req, options, next)
    }
}

/// Middleware instances by id. Filled at boot, read-only afterwards.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn register(&mut self, id: impl Into<String>, middleware: impl Middleware) {
        self.entries.insert(id.into(), Arc::new(middleware));
    }

    pub fn get(&self, id: &str) -> Result<&dyn Middleware> {
        self.entries
            .get(id)
            .map(|m| m.as_ref())
            .ok_or_else(|| Error::UnknownMiddleware(id.to_owned()))
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// The innermost step: the handler invocation.
pub type Terminal<'a> = dyn Fn(&mut Request) -> Result<ActionResult> + 'a;

struct Link<'a> {
    middleware: &'a dyn Middleware,
    options: &'a Options,
}

/// The rest of the chain, as seen from one layer.
pub struct Next<'a> {
    links: &'a [Link<'a>],
    terminal: &'a Terminal<'a>,
}

impl Next<'_> {
    /// Runs the remaining layers and the handler.
    pub fn run(self, req: &mut Request) -> Result<ActionResult> {
        match self.links.split_first() {
            Some((link, rest)) => link.middleware.handle(
                req,
                link.options,
                Next { links: rest, terminal: self.terminal },
            ),
            None => (self.terminal)(req),
        }
    }
}

/// Resolved middleware for one request, outermost first.
pub struct MiddlewareChain<'a> {
    links: Vec<Link<'a>>,
}

impl<'a> MiddlewareChain<'a> {
    /// Resolves every definition against `registry`. An unknown id fails the
    /// whole chain before any layer runs.
    pub fn build<I>(registry: &'a MiddlewareRegistry, defs: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a MiddlewareDef>,
    {
        let links = defs
            .into_iter()
            .map(|def| {
                Ok(Link { middleware: registry.get(def.id())?, options: def.options() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { links })
    }

    /// Runs the chain around `terminal`.
    pub fn run(&self, req: &mut Request, terminal: &Terminal<'_>) -> Result<ActionResult> {
        Next { links: &self.links, terminal }.run(req)
    }

    pub fn len(&self) -> usize { self.links.len() }
    pub fn is_empty(&self) -> bool { self.links.is_empty() }
}
