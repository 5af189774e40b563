//! Route registration and matching through the public API.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;

use portico::{
    ActionResult, App, Dispatcher, Error, FilterDef, MatchStrategy, Method, MiddlewareDef, Param,
    Request, RouteMatch, RouteTable, Router, handler::func, middleware, middleware::SetHeaders,
};

fn ok() -> portico::handler::FnHandler<impl Fn(portico::Args<'_>) -> portico::Result<ActionResult> + Send + Sync + 'static> {
    func([], |_| Ok(ActionResult::success()))
}

#[test]
fn every_registered_route_is_found_by_its_own_method_and_path() {
    let mut table = RouteTable::new();
    table
        .get("/", ok())
        .and_then(|t| t.post("/widgets", ok()))
        .and_then(|t| t.put("/widgets/{id}", ok()))
        .and_then(|t| t.delete("/widgets/{id}", ok()))
        .and_then(|t| t.patch("/files/{*rest}", ok()))
        .unwrap();
    let samples = [
        (Method::Get, "/"),
        (Method::Post, "/widgets"),
        (Method::Put, "/widgets/1"),
        (Method::Delete, "/widgets/1"),
        (Method::Patch, "/files/a/b.txt"),
    ];
    let router = Router::new(table).unwrap();

    for (method, path) in samples {
        assert!(
            matches!(router.match_path(method, path), RouteMatch::Found { route, .. } if route.method() == method),
            "{method} {path}"
        );
    }
}

#[test]
fn method_not_allowed_is_the_union_across_matching_patterns() {
    let mut table = RouteTable::new();
    table
        .get("/items/{id}", ok())
        .and_then(|t| t.put("/items/{id}", ok()))
        .and_then(|t| t.delete("/items/latest", ok()))
        .unwrap();
    let router = Router::new(table).unwrap();

    match router.match_path(Method::Post, "/items/latest") {
        RouteMatch::MethodNotAllowed { allowed } => {
            assert_eq!(allowed, [Method::Get, Method::Put, Method::Delete]);
        }
        other => panic!("expected MethodNotAllowed, got {other:?}"),
    }
    assert!(matches!(router.match_path(Method::Get, "/other"), RouteMatch::NotFound));
}

#[test]
fn nested_groups_concatenate_prefixes_and_order_middleware_outer_first() {
    let mut table = RouteTable::new();
    table
        .group("api", vec!["a".into()], vec![], |api| {
            api.group("/v1/", vec!["b".into()], vec![], |v1| {
                v1.add(Method::Get, "/x", ok(), vec!["c".into()], vec![])?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    table.get("/outside", ok()).unwrap();

    let route = table.lookup(Method::Get, "/api/v1/x").unwrap();
    let ids: Vec<&str> = route.middlewares().iter().map(MiddlewareDef::id).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert!(table.lookup(Method::Get, "/outside").unwrap().middlewares().is_empty());
    assert_eq!(table.under_prefix("/api").count(), 1);
}

#[test]
fn group_middleware_runs_outside_route_middleware_at_dispatch() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let record = |trail: Arc<Mutex<Vec<String>>>| {
        middleware::from_fn(move |req, options, next| {
            trail.lock().unwrap().push(options["id"].as_str().unwrap_or("?").to_owned());
            next.run(req)
        })
    };

    let mut table = RouteTable::new();
    table
        .group(
            "/api",
            vec![MiddlewareDef::new("rec").with("id", json!("group"))],
            vec![FilterDef::new("headers").with("x-api", json!("1"))],
            |api| {
                api.add(
                    Method::Get,
                    "/x",
                    ok(),
                    vec![MiddlewareDef::new("rec").with("id", json!("route"))],
                    vec![],
                )?;
                Ok(())
            },
        )
        .unwrap();

    let dispatcher = Dispatcher::new(
        App::builder()
            .routes(table)
            .middleware("rec", record(Arc::clone(&trail)))
            .filter("headers", SetHeaders)
            .global(MiddlewareDef::new("rec").with("id", json!("global")))
            .build()
            .unwrap(),
    );

    let res = dispatcher.dispatch(Request::builder().uri("/api/x").build()).unwrap();
    assert_eq!(res.header("x-api"), Some("1"));
    assert_eq!(*trail.lock().unwrap(), ["global", "group", "route"]);
}

#[test]
fn invalid_result_status_is_rejected_at_construction() {
    for status in ["maybe", "Success", ""] {
        assert!(matches!(ActionResult::new(status, "x"), Err(Error::InvalidStatus(_))), "{status}");
    }
    assert!(ActionResult::new("fail", "x").is_ok());
}

#[test]
fn route_variable_beats_query_variable_of_the_same_name() {
    let mut table = RouteTable::new();
    table
        .get(
            "/widgets/{id}",
            func([Param::value("id")], |args| {
                Ok(ActionResult::success().with_value("id", json!(args.str("id"))))
            }),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(App::builder().routes(table).build().unwrap());

    let req = Request::builder()
        .uri("/widgets/5?id=9")
        .header("Accept", "application/json")
        .build();
    let res = dispatcher.dispatch(req).unwrap();
    assert_eq!(res.body_text(), r#"{"status":"success","data":{"id":"5"},"message":""}"#);
}

#[test]
fn duplicate_and_malformed_routes_fail_at_boot() {
    let mut table = RouteTable::new();
    table.get("/a/{id}", ok()).unwrap();
    assert!(matches!(table.get("/a/{id}/", ok()), Err(Error::DuplicateRoute { .. })));
    assert!(matches!(table.get("/b/{*rest}/tail", ok()), Err(Error::InvalidRoute { .. })));
    assert!(matches!(table.get("/c/{open", ok()), Err(Error::InvalidRoute { .. })));
}

#[test]
fn trie_strategy_prefers_static_segments() {
    let mut table = RouteTable::new();
    table
        .get("/users/{id}", ok().named("by-id"))
        .and_then(|t| t.get("/users/me", ok().named("me")))
        .unwrap();

    let segments = Router::with_matcher(
        {
            let mut t = RouteTable::new();
            t.get("/users/{id}", ok().named("by-id"))
                .and_then(|t| t.get("/users/me", ok().named("me")))
                .unwrap();
            t
        },
        MatchStrategy::Segments.build(),
    )
    .unwrap();
    let trie = Router::with_matcher(table, MatchStrategy::Trie.build()).unwrap();

    let label = |router: &Router| match router.match_path(Method::Get, "/users/me") {
        RouteMatch::Found { route, .. } => route.handler().label(),
        other => panic!("expected Found, got {other:?}"),
    };
    assert_eq!(label(&segments), "by-id");
    assert_eq!(label(&trie), "me");
}

#[test]
fn escaped_path_variables_bind_like_escaped_query_variables() {
    let mut table = RouteTable::new();
    table
        .get(
            "/greet/{name}",
            func([Param::value("name")], |args| {
                Ok(ActionResult::success().with_value("name", json!(args.str("name"))))
            }),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(App::builder().routes(table).build().unwrap());

    for uri in ["/greet/caf%C3%A9", "/greet/x?name=ignored", "/greet/caf%C3%A9?name=caf%C3%A9"] {
        let req = Request::builder().uri(uri).header("Accept", "application/json").build();
        let res = dispatcher.dispatch(req).unwrap();
        let expected = if uri.contains("/x?") { "x" } else { "café" };
        assert_eq!(
            res.body_text(),
            format!(r#"{{"status":"success","data":{{"name":"{expected}"}},"message":""}}"#),
            "{uri}"
        );
    }
}
