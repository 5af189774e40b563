//! Handlers, their parameter descriptors, and type erasure.
//!
//! # How handlers are stored
//!
//! The route table holds handlers of *different* concrete types, so every
//! handler is hidden behind the [`Handler`] trait object and shared as a
//! [`BoxedHandler`] (`Arc<dyn Handler>`). A handler carries the ordered list
//! of [`Param`] descriptors it was declared with; the
//! [`HandlerInvoker`](crate::HandlerInvoker) reads that list to bind
//! arguments, so nothing is introspected at request time.
//!
//! ```text
//! handler::func([Param::value("id")], |args| { … })   ← user writes this
//!        ↓ table.get("/widgets/{id}", h)
//! HandlerRef::Func(Arc<FnHandler<F>>)                  ← stored on the route
//!        ↓ HandlerInvoker::invoke
//! handler.params()  →  Args  →  handler.call(args)     ← one vtable dispatch
//! ```
//!
//! A route can also point at a handler indirectly: a `(controller, action)`
//! pair or the id of an invokable type. Those resolve through the
//! [`HandlerRegistry`] filled at boot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::result::ActionResult;

// ── Parameter descriptors ─────────────────────────────────────────────────────

/// Where a parameter's value comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParamKind {
    /// The current request.
    Request,
    /// A persisted entity of the named kind, loaded by id or slug.
    Entity(String),
    /// A route variable, query variable, default or null, in that order.
    Value,
}

/// One declared handler parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Value>,
    nullable: bool,
}

impl Param {
    pub fn request(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Request)
    }

    pub fn entity(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Entity(kind.into()))
    }

    pub fn value(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Value)
    }

    /// Value used when neither a route nor a query variable is present.
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Binds null instead of failing when no source provides a value.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn kind(&self) -> &ParamKind { &self.kind }
    pub fn default_value(&self) -> Option<&Value> { self.default.as_ref() }
    pub fn is_nullable(&self) -> bool { self.nullable }

    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self { name: name.into(), kind, default: None, nullable: false }
    }
}

// ── Bound arguments ───────────────────────────────────────────────────────────

/// A bound argument value.
#[derive(Debug)]
pub enum Arg<'r> {
    Request(&'r Request),
    /// `None` when no lookup matched; the handler decides what that means.
    Entity(Option<Entity>),
    /// Raw string from the route or query, a declared default, or null.
    Value(Value),
}

/// Arguments bound for one call, in declaration order.
#[derive(Debug, Default)]
pub struct Args<'r> {
    bound: Vec<(String, Arg<'r>)>,
}

impl<'r> Args<'r> {
    pub(crate) fn push(&mut self, name: &str, arg: Arg<'r>) {
        self.bound.push((name.to_owned(), arg));
    }

    pub fn get(&self, name: &str) -> Option<&Arg<'r>> {
        self.bound.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// The request, if a request parameter was declared.
    pub fn request(&self) -> Option<&'r Request> {
        self.bound.iter().find_map(|(_, a)| match a {
            Arg::Request(req) => Some(*req),
            _ => None,
        })
    }

    /// The loaded entity, `None` when declared but not found.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        match self.get(name) {
            Some(Arg::Entity(entity)) => entity.as_ref(),
            _ => None,
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name) {
            Some(Arg::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// A string value. Route and query variables are always strings.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn is_null(&self, name: &str) -> bool {
        matches!(self.get(name), Some(Arg::Value(Value::Null)) | Some(Arg::Entity(None)))
    }

    pub fn len(&self) -> usize { self.bound.len() }
    pub fn is_empty(&self) -> bool { self.bound.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bound.iter().map(|(n, _)| n.as_str())
    }
}

// ── Handler trait ─────────────────────────────────────────────────────────────

/// Application logic reachable from a route.
///
/// Implement it on a struct to register an invokable type, or wrap a closure
/// with [`func`].
pub trait Handler: Send + Sync + 'static {
    /// Name used in logs, error context and the template naming convention.
    fn name(&self) -> &str;

    /// Declared parameters, bound in this order.
    fn params(&self) -> &[Param];

    /// Infrastructure failures go in `Err`; expected failures are
    /// `Ok(ActionResult::fail(..))`.
    fn call(&self, args: Args<'_>) -> Result<ActionResult>;
}

/// A type-erased handler shared across requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// Closure-backed [`Handler`]. Build with [`func`].
pub struct FnHandler<F> {
    name: String,
    params: Vec<Param>,
    f: F,
}

/// Wraps a closure and its parameter list into a handler.
///
/// The name defaults to the closure's type name; override it with
/// [`FnHandler::named`] to get readable logs and template names.
pub fn func<F>(params: impl IntoIterator<Item = Param>, f: F) -> FnHandler<F>
where
    F: Fn(Args<'_>) -> Result<ActionResult> + Send + Sync + 'static,
{
    FnHandler {
        name: std::any::type_name::<F>().to_owned(),
        params: params.into_iter().collect(),
        f,
    }
}

impl<F> FnHandler<F> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(Args<'_>) -> Result<ActionResult> + Send + Sync + 'static,
{
    fn name(&self) -> &str { &self.name }
    fn params(&self) -> &[Param] { &self.params }

    fn call(&self, args: Args<'_>) -> Result<ActionResult> {
        (self.f)(args)
    }
}

// ── Handler references ────────────────────────────────────────────────────────

/// What a route points at.
#[derive(Clone)]
pub enum HandlerRef {
    /// A closure or function, held directly.
    Func(BoxedHandler),
    /// An action on a controller registered at boot.
    Action { controller: String, action: String },
    /// An invokable type registered at boot under this id.
    Invokable(String),
}

impl HandlerRef {
    pub fn action(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Action { controller: controller.into(), action: action.into() }
    }

    pub fn invokable(id: impl Into<String>) -> Self {
        Self::Invokable(id.into())
    }

    /// Human-readable name: the handler's own name, `controller.action`, or
    /// the invokable id.
    pub fn label(&self) -> String {
        match self {
            Self::Func(h) => h.name().to_owned(),
            Self::Action { controller, action } => format!("{controller}.{action}"),
            Self::Invokable(id) => id.clone(),
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(h) => f.debug_tuple("Func").field(&h.name()).finish(),
            Self::Action { controller, action } => f
                .debug_struct("Action")
                .field("controller", controller)
                .field("action", action)
                .finish(),
            Self::Invokable(id) => f.debug_tuple("Invokable").field(id).finish(),
        }
    }
}

impl<F> From<FnHandler<F>> for HandlerRef
where
    F: Fn(Args<'_>) -> Result<ActionResult> + Send + Sync + 'static,
{
    fn from(h: FnHandler<F>) -> Self {
        Self::Func(Arc::new(h))
    }
}

impl From<BoxedHandler> for HandlerRef {
    fn from(h: BoxedHandler) -> Self {
        Self::Func(h)
    }
}

// ── Controllers and the handler registry ──────────────────────────────────────

/// A named group of actions, addressed by [`HandlerRef::Action`].
pub struct Controller {
    name: String,
    actions: HashMap<String, BoxedHandler>,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), actions: HashMap::new() }
    }

    pub fn action(mut self, name: impl Into<String>, handler: impl Handler) -> Self {
        self.actions.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str { &self.name }
}

/// Controllers and invokables by id. Filled at boot, read-only afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    controllers: HashMap<String, Controller>,
    invokables: HashMap<String, BoxedHandler>,
}

impl HandlerRegistry {
    pub fn register_controller(&mut self, controller: Controller) {
        self.controllers.insert(controller.name.clone(), controller);
    }

    pub fn register_invokable(&mut self, id: impl Into<String>, handler: impl Handler) {
        self.invokables.insert(id.into(), Arc::new(handler));
    }

    /// Resolves a reference to the handler object it names.
    pub fn resolve(&self, handler: &HandlerRef) -> Result<BoxedHandler> {
        let found = match handler {
            HandlerRef::Func(h) => Some(Arc::clone(h)),
            HandlerRef::Action { controller, action } => self
                .controllers
                .get(controller)
                .and_then(|c| c.actions.get(action))
                .cloned(),
            HandlerRef::Invokable(id) => self.invokables.get(id).cloned(),
        };
        found.ok_or_else(|| Error::UnresolvedHandler(handler.label()))
    }
}
