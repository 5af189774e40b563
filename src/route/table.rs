//! Boot-time route registration with nested groups.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::error::{Error, Result};
use crate::handler::HandlerRef;
use crate::method::Method;
use crate::middleware::{FilterDef, MiddlewareDef};
use crate::route::{RouteDefinition, normalize_path};

/// Prefix, middleware and filters inherited by every route inside a group.
#[derive(Debug)]
struct GroupFrame {
    prefix: String,
    middlewares: Vec<MiddlewareDef>,
    filters: Vec<FilterDef>,
}

/// All routes, in registration order.
///
/// Built once at boot; registration order is significant because the first
/// registered pattern wins a tie in the [`Router`](crate::Router).
///
/// ```rust
/// use portico::{ActionResult, Method, MiddlewareDef, RouteTable, handler::func};
///
/// let mut table = RouteTable::new();
/// table.group("/admin", vec![MiddlewareDef::new("auth")], vec![], |admin| {
///     admin.get("/widgets", func([], |_| Ok(ActionResult::success())))?;
///     Ok(())
/// })?;
///
/// let route = table.lookup(Method::Get, "/admin/widgets").unwrap();
/// assert_eq!(route.middlewares()[0].id(), "auth");
/// # Ok::<(), portico::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
    index: HashMap<(Method, String), usize>,
    groups: Vec<GroupFrame>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route, applying every active group's prefix, middleware
    /// and filters outer-to-inner ahead of the route's own.
    pub fn add(
        &mut self,
        method: Method,
        path: &str,
        handler: impl Into<HandlerRef>,
        middlewares: Vec<MiddlewareDef>,
        filters: Vec<FilterDef>,
    ) -> Result<&mut Self> {
        let mut full = String::new();
        for frame in &self.groups {
            full.push('/');
            full.push_str(&frame.prefix);
        }
        full.push('/');
        full.push_str(path);
        let path = normalize_path(&full);
        validate_pattern(&path)?;

        let key = (method, path.clone());
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateRoute { method: method.to_string(), path });
        }

        let mut all_middlewares: Vec<MiddlewareDef> = self.groups.iter()
            .flat_map(|g| g.middlewares.iter().cloned())
            .collect();
        all_middlewares.extend(middlewares);
        let mut all_filters: Vec<FilterDef> = self.groups.iter()
            .flat_map(|g| g.filters.iter().cloned())
            .collect();
        all_filters.extend(filters);

        self.index.insert(key, self.routes.len());
        self.routes.push(RouteDefinition::new(
            method,
            path,
            handler.into(),
            all_middlewares,
            all_filters,
        ));
        Ok(self)
    }

    /// Registers everything `f` adds under `prefix`, inheriting `middlewares`
    /// and `filters`. The group frame is popped when `f` returns, whether it
    /// succeeded, failed, or panicked.
    pub fn group<F>(
        &mut self,
        prefix: &str,
        middlewares: Vec<MiddlewareDef>,
        filters: Vec<FilterDef>,
        f: F,
    ) -> Result<&mut Self>
    where
        F: FnOnce(&mut RouteTable) -> Result<()>,
    {
        self.groups.push(GroupFrame {
            prefix: normalize_path(prefix).trim_start_matches('/').to_owned(),
            middlewares,
            filters,
        });
        {
            let mut scope = GroupScope { table: &mut *self };
            f(&mut scope)?;
        }
        Ok(self)
    }

    pub fn get(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<&mut Self> {
        self.add(Method::Get, path, handler, Vec::new(), Vec::new())
    }

    pub fn post(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<&mut Self> {
        self.add(Method::Post, path, handler, Vec::new(), Vec::new())
    }

    pub fn put(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<&mut Self> {
        self.add(Method::Put, path, handler, Vec::new(), Vec::new())
    }

    pub fn patch(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<&mut Self> {
        self.add(Method::Patch, path, handler, Vec::new(), Vec::new())
    }

    pub fn delete(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<&mut Self> {
        self.add(Method::Delete, path, handler, Vec::new(), Vec::new())
    }

    /// Direct lookup by method and (un-normalized) pattern.
    pub fn lookup(&self, method: Method, path: &str) -> Option<&RouteDefinition> {
        self.index
            .get(&(method, normalize_path(path)))
            .map(|&i| &self.routes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.iter()
    }

    /// Routes satisfying `predicate`, in registration order.
    pub fn filter<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a RouteDefinition>
    where
        P: Fn(&RouteDefinition) -> bool + 'a,
    {
        self.routes.iter().filter(move |r| predicate(r))
    }

    /// Routes at or below `prefix`, segment-aligned: `/admin` selects
    /// `/admin` and `/admin/users` but not `/administrators`.
    pub fn under_prefix<'a>(&'a self, prefix: &str) -> impl Iterator<Item = &'a RouteDefinition> {
        let prefix = normalize_path(prefix);
        self.filter(move |r| {
            prefix == "/"
                || r.path() == prefix
                || r.path().strip_prefix(prefix.as_str()).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub(crate) fn routes(&self) -> &[RouteDefinition] { &self.routes }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}

/// Pops the innermost group frame on drop.
struct GroupScope<'a> {
    table: &'a mut RouteTable,
}

impl Deref for GroupScope<'_> {
    type Target = RouteTable;
    fn deref(&self) -> &RouteTable { self.table }
}

impl DerefMut for GroupScope<'_> {
    fn deref_mut(&mut self) -> &mut RouteTable { self.table }
}

impl Drop for GroupScope<'_> {
    fn drop(&mut self) {
        self.table.groups.pop();
    }
}

/// Rejects malformed `{…}` captures at registration instead of at match time.
fn validate_pattern(path: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (i, segment) in segments.iter().enumerate() {
        let opens = segment.matches('{').count();
        let closes = segment.matches('}').count();
        let invalid = |reason: &str| Error::InvalidRoute {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };
        if opens != closes || opens > 1 {
            return Err(invalid("unbalanced or repeated `{}` in a segment"));
        }
        if opens == 1 {
            if !(segment.starts_with('{') && segment.ends_with('}')) {
                return Err(invalid("a capture must span the whole segment"));
            }
            let name = &segment[1..segment.len() - 1];
            let name = name.strip_prefix('*').unwrap_or(name);
            if name.is_empty() {
                return Err(invalid("empty capture name"));
            }
            if segment.starts_with("{*") && i + 1 != segments.len() {
                return Err(invalid("a catch-all must be the last segment"));
            }
        }
    }
    Ok(())
}
