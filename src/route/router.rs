//! Request → route resolution.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

use crate::error::Result;
use crate::method::Method;
use crate::request::Request;
use crate::route::matcher::{MatchStrategy, PathMatcher};
use crate::route::{RouteDefinition, RouteTable, normalize_path};

/// Outcome of matching one request. Exactly one state per request.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    Found {
        route: &'a RouteDefinition,
        params: HashMap<String, String>,
    },
    NotFound,
    /// The path matched, the method did not. `allowed` lists every method
    /// registered for the matching pattern(s), in registration order.
    MethodNotAllowed { allowed: Vec<Method> },
}

/// A frozen route table plus the matcher built from it.
///
/// Distinct patterns are handed to the matcher once, in first-registration
/// order; each remembers the routes (one per method) that share it.
pub struct Router {
    table: RouteTable,
    matcher: Box<dyn PathMatcher>,
    by_pattern: Vec<Vec<usize>>,
}

impl Router {
    /// Builds with the default [`MatchStrategy::Segments`] strategy.
    pub fn new(table: RouteTable) -> Result<Self> {
        Self::with_matcher(table, MatchStrategy::default().build())
    }

    pub fn with_matcher(table: RouteTable, mut matcher: Box<dyn PathMatcher>) -> Result<Self> {
        let mut pattern_ids: HashMap<&str, usize> = HashMap::new();
        let mut by_pattern: Vec<Vec<usize>> = Vec::new();

        for (route_idx, route) in table.routes().iter().enumerate() {
            match pattern_ids.get(route.path()) {
                Some(&p) => by_pattern[p].push(route_idx),
                None => {
                    let p = by_pattern.len();
                    matcher.insert(p, route.path())?;
                    pattern_ids.insert(route.path(), p);
                    by_pattern.push(vec![route_idx]);
                }
            }
        }
        drop(pattern_ids);

        Ok(Self { table, matcher, by_pattern })
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn match_request(&self, req: &Request) -> RouteMatch<'_> {
        self.match_path(req.method(), req.path())
    }

    /// Among the patterns `path` satisfies, the first (in the matcher's
    /// priority order) that has a route for `method` wins.
    pub fn match_path(&self, method: Method, path: &str) -> RouteMatch<'_> {
        let hits = self.matcher.matches(&normalize_path(path));
        if hits.is_empty() {
            return RouteMatch::NotFound;
        }

        let routes = self.table.routes();
        let mut allowed: Vec<Method> = Vec::new();
        for hit in hits {
            for &route_idx in &self.by_pattern[hit.index] {
                let route = &routes[route_idx];
                if route.method() == method {
                    return RouteMatch::Found { route, params: decode(hit.params) };
                }
                if !allowed.contains(&route.method()) {
                    allowed.push(route.method());
                }
            }
        }
        RouteMatch::MethodNotAllowed { allowed }
    }

    /// Every method registered for a pattern `path` satisfies, deduplicated,
    /// in the same order [`RouteMatch::MethodNotAllowed`] lists them. Empty
    /// when nothing matches the path.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let routes = self.table.routes();
        let mut allowed: Vec<Method> = Vec::new();
        for hit in self.matcher.matches(&normalize_path(path)) {
            for &route_idx in &self.by_pattern[hit.index] {
                let method = routes[route_idx].method();
                if !allowed.contains(&method) {
                    allowed.push(method);
                }
            }
        }
        allowed
    }
}

/// Path variables are captured from the raw path; bind them decoded, like
/// query variables. Invalid UTF-8 is replaced rather than rejected.
fn decode(params: HashMap<String, String>) -> HashMap<String, String> {
    params
        .into_iter()
        .map(|(name, raw)| {
            let value = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
            (name, value)
        })
        .collect()
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.len())
            .field("patterns", &self.by_pattern.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerRef, func};
    use crate::result::ActionResult;

    fn named(name: &str) -> HandlerRef {
        func([], |_| Ok(ActionResult::success())).named(name).into()
    }

    fn router(strategy: MatchStrategy) -> Router {
        let mut table = RouteTable::new();
        table.get("/widgets/{id}", named("show")).unwrap();
        table.put("/widgets/{id}", named("update")).unwrap();
        table.post("/widgets", named("create")).unwrap();
        table.delete("/widgets/new", named("cancel-draft")).unwrap();
        Router::with_matcher(table, strategy.build()).unwrap()
    }

    #[test]
    fn registered_method_and_path_is_found_with_variables() {
        let router = router(MatchStrategy::Segments);
        match router.match_path(Method::Put, "/widgets/5/") {
            RouteMatch::Found { route, params } => {
                assert_eq!(route.handler().label(), "update");
                assert_eq!(params["id"], "5");
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn wrong_method_reports_every_method_of_the_pattern() {
        let router = router(MatchStrategy::Segments);
        match router.match_path(Method::Post, "/widgets/5") {
            RouteMatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, [Method::Get, Method::Put]);
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn first_registered_pattern_wins_then_later_patterns_are_tried() {
        let router = router(MatchStrategy::Segments);
        match router.match_path(Method::Get, "/widgets/new") {
            RouteMatch::Found { route, .. } => assert_eq!(route.handler().label(), "show"),
            other => panic!("expected Found, got {other:?}"),
        }
        match router.match_path(Method::Delete, "/widgets/new") {
            RouteMatch::Found { route, .. } => assert_eq!(route.handler().label(), "cancel-draft"),
            other => panic!("expected Found, got {other:?}"),
        }
        match router.match_path(Method::Patch, "/widgets/new") {
            RouteMatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, [Method::Get, Method::Put, Method::Delete]);
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn path_variables_are_percent_decoded_for_every_strategy() {
        for strategy in [MatchStrategy::Segments, MatchStrategy::Trie] {
            let router = router(strategy);
            match router.match_path(Method::Get, "/widgets/caf%C3%A9%20bar+x") {
                RouteMatch::Found { params, .. } => assert_eq!(params["id"], "café bar+x"),
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn allowed_methods_agree_with_method_not_allowed() {
        let router = router(MatchStrategy::Segments);
        assert_eq!(router.allowed_methods("/widgets/new/"), [Method::Get, Method::Put, Method::Delete]);
        assert_eq!(router.allowed_methods("/widgets/5"), [Method::Get, Method::Put]);
        assert!(router.allowed_methods("/gadgets").is_empty());
    }

    #[test]
    fn unknown_path_is_not_found() {
        for strategy in [MatchStrategy::Segments, MatchStrategy::Trie] {
            let router = router(strategy);
            assert!(matches!(router.match_path(Method::Get, "/gadgets"), RouteMatch::NotFound));
        }
    }

    #[test]
    fn trie_strategy_resolves_the_same_table() {
        let router = router(MatchStrategy::Trie);
        assert!(matches!(
            router.match_path(Method::Get, "/widgets/9"),
            RouteMatch::Found { params, .. } if params["id"] == "9"
        ));
        match router.match_path(Method::Get, "/widgets/new") {
            RouteMatch::MethodNotAllowed { allowed } => assert_eq!(allowed, [Method::Delete]),
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }
}
