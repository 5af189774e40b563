//! # portico
//!
//! The request-dispatch kernel of a server-side web framework: it takes an
//! incoming request, finds the route, runs the middleware onion around the
//! handler, binds the handler's arguments, and negotiates the handler's
//! uniform result into JSON, a rendered document or a redirect.
//!
//! ## Pipeline
//!
//! ```text
//! Request ─▶ Router ─▶ global + route middleware ─▶ HandlerInvoker ─▶ handler
//!                                                                       │
//! Emitter ◀─ ResponseNegotiator ◀─ response filters ◀─ ActionResult ◀───┘
//! ```
//!
//! - Routes are registered once at boot into a [`RouteTable`], optionally in
//!   nested groups that share a path prefix, middleware and filters.
//! - Handlers declare their parameters ([`Param`]) and return
//!   `Result<ActionResult>`. Expected failures are `fail` results; `Err` and
//!   panics are unhandled and caught once by the [`Dispatcher`].
//! - The kernel is synchronous. [`Server`] runs it on tokio's blocking pool;
//!   [`emit::ConsoleEmitter`] runs it from a command line.
//!
//! ## Quick start
//!
//! ```rust
//! use portico::{ActionResult, App, Dispatcher, Param, Request, RouteTable, Status, handler::func};
//! use serde_json::json;
//!
//! let mut routes = RouteTable::new();
//! routes.get("/widgets/{id}", func([Param::value("id")], |args| {
//!     match args.str("id").and_then(|id| id.parse::<u64>().ok()) {
//!         Some(id) => Ok(ActionResult::success().with_value("id", json!(id)).with_message("ok")),
//!         None => Ok(ActionResult::fail("Bad id").with_status(Status::BadRequest)),
//!     }
//! }).named("widgets.show"))?;
//!
//! let dispatcher = Dispatcher::new(App::builder().routes(routes).build()?);
//! let req = Request::builder().uri("/widgets/5").header("Accept", "application/json").build();
//! let res = dispatcher.dispatch(req)?;
//!
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.body_text(), r#"{"status":"success","data":{"id":5},"message":"ok"}"#);
//! # Ok::<(), portico::Error>(())
//! ```

mod app;
mod dispatch;
mod error;
mod invoker;
mod method;
mod request;
mod response;
mod result;
mod server;
mod status;

pub mod config;
pub mod diagnostic;
pub mod emit;
pub mod entity;
pub mod handler;
pub mod middleware;
pub mod negotiate;
pub mod observability;
pub mod route;

pub use app::{App, AppBuilder};
pub use config::{Config, Environment};
pub use dispatch::Dispatcher;
pub use entity::{Entity, EntityRepository};
pub use error::{Error, Result};
pub use handler::{Args, Controller, Handler, HandlerRef, Param};
pub use invoker::HandlerInvoker;
pub use method::Method;
pub use middleware::{FilterDef, Middleware, MiddlewareDef, Next, ResponseFilter};
pub use negotiate::{ClientClassifier, Format, ResponseNegotiator, TemplateEngine};
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, Response, ResponseBuilder};
pub use result::{ActionResult, ResultStatus};
pub use route::{MatchStrategy, RouteDefinition, RouteMatch, RouteTable, Router};
pub use server::Server;
pub use status::Status;
