//! The request pipeline.
//!
//! ```text
//! Request ─▶ Router ─┬─ NotFound ─────────────▶ fail 404 ─────────────┐
//!                    ├─ MethodNotAllowed ─────▶ fail 405 + Allow ─────┤
//!                    └─ Found ─▶ middleware ─▶ invoker ─▶ filters ────┴─▶ negotiator ─▶ Response
//! ```
//!
//! [`Dispatcher::dispatch`] is the single place where unhandled failures are
//! caught: `Err`s and panics from middleware, handlers, repositories and
//! filters all land here, are logged once with handler and route context, and
//! then either become a generic `500` result (production) or are returned to
//! the transport for the diagnostic page (development).

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;
use tracing::{debug, error};

use crate::app::App;
use crate::error::{Error, Result};
use crate::invoker::HandlerInvoker;
use crate::method::Method;
use crate::middleware::{MiddlewareChain, apply_filters};
use crate::request::Request;
use crate::response::Response;
use crate::result::ActionResult;
use crate::route::{RouteDefinition, RouteMatch};
use crate::status::Status;

/// Owns the [`App`] and runs requests through it.
#[derive(Debug)]
pub struct Dispatcher {
    app: App,
}

impl Dispatcher {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Runs one request to completion.
    ///
    /// Returns `Err` only in development mode, and only for failures the
    /// application did not handle; every other outcome is a [`Response`].
    pub fn dispatch(&self, mut req: Request) -> Result<Response> {
        let (result, handler) = match self.app.router.match_request(&req) {
            RouteMatch::NotFound => {
                debug!(method = %req.method(), path = %req.path(), "no route matched");
                (not_found(), None)
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                debug!(method = %req.method(), path = %req.path(), ?allowed, "method not allowed");
                (method_not_allowed(&allowed), None)
            }
            RouteMatch::Found { route, params } => {
                req.set_params(params);
                let label = route.handler().label();
                match self.run_guarded(route, &mut req) {
                    Ok(result) => (result, Some(label)),
                    Err(err) => {
                        error!(
                            handler = %label,
                            route = %route,
                            defect = err.is_defect(),
                            error = %err,
                            "unhandled failure while dispatching"
                        );
                        if self.app.config.is_development() {
                            return Err(err);
                        }
                        let result = ActionResult::error(self.app.config.generic_error_message.as_str())
                            .with_status(Status::InternalServerError);
                        (result, None)
                    }
                }
            }
        };

        Ok(self.app.negotiator().handle(&req, result, handler.as_deref()))
    }

    /// Answers a request whose method is outside [`Method`], e.g. `BREW`.
    ///
    /// Nothing is routed: a path with registered routes gets the same 405 as
    /// a known method would, anything else a 404. `req` supplies the path
    /// and the negotiation headers; its own method is not consulted.
    pub fn reject_method(&self, method: &str, req: &Request) -> Response {
        let allowed = self.app.router.allowed_methods(req.path());
        debug!(method, path = %req.path(), ?allowed, "unsupported request method");
        let result = if allowed.is_empty() { not_found() } else { method_not_allowed(&allowed) };
        self.app.negotiator().handle(req, result, None)
    }

    /// Middleware, handler and filters, with panics turned into
    /// [`Error::Panic`].
    fn run_guarded(&self, route: &RouteDefinition, req: &mut Request) -> Result<ActionResult> {
        catch_unwind(AssertUnwindSafe(|| self.run_route(route, req)))
            .unwrap_or_else(|payload| Err(Error::Panic(panic_message(payload.as_ref()))))
    }

    fn run_route(&self, route: &RouteDefinition, req: &mut Request) -> Result<ActionResult> {
        let app = &self.app;
        let chain = MiddlewareChain::build(&app.middleware, app.global.iter().chain(route.middlewares()))?;
        let invoker = HandlerInvoker::new(&app.handlers, &app.entities);
        let terminal = |req: &mut Request| invoker.invoke(route.handler(), req, route);

        let result = chain.run(req, &terminal)?;
        apply_filters(&app.filters, route.filters(), req, result)
    }
}

fn not_found() -> ActionResult {
    ActionResult::fail("Not Found").with_status(Status::NotFound)
}

/// 405 with the methods both in `data.allowed` and in `Allow`.
fn method_not_allowed(allowed: &[Method]) -> ActionResult {
    let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
    let listed = allowed.iter().map(|m| Value::from(m.as_str())).collect();
    ActionResult::fail("Method Not Allowed")
        .with_status(Status::MethodNotAllowed)
        .with_value("allowed", Value::Array(listed))
        .with_header("allow", allow)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::{Config, Environment};
    use crate::handler::{Param, func};
    use crate::middleware::{FilterDef, Options, SetHeaders, from_fn};
    use crate::route::RouteTable;

    fn json_get(uri: &str) -> Request {
        Request::builder().uri(uri).header("Accept", "application/json").build()
    }

    fn dispatcher(environment: Environment) -> Dispatcher {
        let mut routes = RouteTable::new();
        routes
            .get("/echo/{word}", func([Param::value("word")], |args| {
                Ok(ActionResult::success().with_message(args.str("word").unwrap_or_default()))
            }).named("echo"))
            .unwrap()
            .get("/boom", func([], |_| -> Result<ActionResult> { panic!("kaboom") }).named("boom"))
            .unwrap()
            .get("/fails", func([], |_| Err(Error::handler("disk on fire"))).named("fails"))
            .unwrap()
            .get("/needs/{x}", func([Param::value("y")], |_| Ok(ActionResult::success())).named("needs"))
            .unwrap()
            .add(
                Method::Get,
                "/filtered",
                func([], |_| Ok(ActionResult::success())).named("filtered"),
                vec![],
                vec![FilterDef::new("headers").with("x-filtered", json!("yes"))],
            )
            .unwrap()
            .add(Method::Get, "/unwired", func([], |_| Ok(ActionResult::success())), vec!["nope".into()], vec![])
            .unwrap()
            .add(Method::Get, "/unfiltered", func([], |_| Ok(ActionResult::success())), vec![], vec![FilterDef::new("nope")])
            .unwrap()
            .add(Method::Get, "/filter-boom", func([], |_| Ok(ActionResult::success())), vec![], vec![FilterDef::new("explode")])
            .unwrap();

        let config = Config { environment, ..Config::default() };
        let app = App::builder()
            .config(config)
            .routes(routes)
            .filter("headers", SetHeaders)
            .filter("explode", |_: &Request, _: ActionResult, _: &Options| -> Result<ActionResult> {
                panic!("filter blew up")
            })
            .middleware(
                "tag",
                from_fn(|req, _, next| {
                    req.set_header("x-tagged", "1");
                    next.run(req).map(|r| r.with_header("x-outer", "tag"))
                }),
            )
            .global("tag")
            .build()
            .unwrap();
        Dispatcher::new(app)
    }

    #[test]
    fn found_route_runs_global_middleware_and_handler() {
        let res = dispatcher(Environment::Production).dispatch(json_get("/echo/hi")).unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.header("x-outer"), Some("tag"));
        assert_eq!(res.body_text(), r#"{"status":"success","data":{},"message":"hi"}"#);
    }

    #[test]
    fn not_found_is_a_404_fail_result() {
        let res = dispatcher(Environment::Production).dispatch(json_get("/nowhere")).unwrap();
        assert_eq!(res.status(), 404);
        assert_eq!(res.body_text(), r#"{"status":"fail","data":{},"message":"Not Found"}"#);
    }

    #[test]
    fn method_not_allowed_lists_methods_in_data_and_allow_header() {
        let req = Request::builder()
            .method(Method::Delete)
            .uri("/echo/hi")
            .header("Accept", "application/json")
            .build();
        let res = dispatcher(Environment::Production).dispatch(req).unwrap();
        assert_eq!(res.status(), 405);
        assert_eq!(res.header("allow"), Some("GET"));
        assert_eq!(
            res.body_text(),
            r#"{"status":"fail","data":{"allowed":["GET"]},"message":"Method Not Allowed"}"#
        );
    }

    #[test]
    fn unsupported_method_is_answered_from_the_route_table() {
        let dispatcher = dispatcher(Environment::Production);

        let res = dispatcher.reject_method("BREW", &json_get("/echo/hi"));
        assert_eq!(res.status(), 405);
        assert_eq!(res.header("allow"), Some("GET"));
        assert_eq!(
            res.body_text(),
            r#"{"status":"fail","data":{"allowed":["GET"]},"message":"Method Not Allowed"}"#
        );

        let res = dispatcher.reject_method("BREW", &json_get("/nowhere"));
        assert_eq!(res.status(), 404);
        assert_eq!(res.header("allow"), None);
    }

    #[test]
    fn filters_run_after_the_chain() {
        let res = dispatcher(Environment::Production).dispatch(json_get("/filtered")).unwrap();
        assert_eq!(res.header("x-filtered"), Some("yes"));
        assert_eq!(res.header("x-outer"), Some("tag"));
    }

    #[test]
    fn production_masks_errors_and_panics_as_generic_500() {
        let dispatcher = dispatcher(Environment::Production);
        for uri in ["/boom", "/fails", "/needs/1", "/unwired", "/unfiltered", "/filter-boom"] {
            let res = dispatcher.dispatch(json_get(uri)).unwrap();
            assert_eq!(res.status(), 500, "{uri}");
            let body: Value = serde_json::from_slice(res.body()).unwrap();
            assert_eq!(body["status"], "error", "{uri}");
            assert_eq!(body["message"], Config::default().generic_error_message, "{uri}");
            assert_eq!(body["data"], json!({}), "{uri}");
        }
    }

    #[test]
    fn development_returns_the_error_to_the_transport() {
        let dispatcher = dispatcher(Environment::Development);

        let err = dispatcher.dispatch(json_get("/boom")).unwrap_err();
        assert!(matches!(err, Error::Panic(ref m) if m == "kaboom"));

        let err = dispatcher.dispatch(json_get("/unwired")).unwrap_err();
        assert!(matches!(err, Error::UnknownMiddleware(ref id) if id == "nope"));
        assert!(err.is_defect());

        let err = dispatcher.dispatch(json_get("/filter-boom")).unwrap_err();
        assert!(matches!(err, Error::Panic(ref m) if m == "filter blew up"));

        let err = dispatcher.dispatch(json_get("/needs/1")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing argument `y` for handler `needs` on route `GET /needs/{x}`"
        );
    }

    #[test]
    fn panic_payload_formats() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }
}
