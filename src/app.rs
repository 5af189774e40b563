//! Application context.
//!
//! Everything a request needs (routes, registries, templates, config) is
//! gathered once by [`AppBuilder`] on a single thread at boot and frozen into
//! an [`App`]. Nothing is global: the [`Dispatcher`](crate::Dispatcher) owns
//! the app, and the HTTP transport shares the dispatcher behind an `Arc`.

use std::fmt;

use tracing::info;

use crate::config::Config;
use crate::entity::{EntityRegistry, EntityRepository};
use crate::error::Result;
use crate::handler::{Controller, Handler, HandlerRegistry};
use crate::middleware::{FilterRegistry, Middleware, MiddlewareDef, MiddlewareRegistry, ResponseFilter};
use crate::negotiate::{ClientClassifier, NoTemplates, ResponseNegotiator, TemplateEngine};
use crate::route::{MatchStrategy, RouteTable, Router};

/// The frozen application context.
pub struct App {
    pub(crate) config: Config,
    pub(crate) router: Router,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) entities: EntityRegistry,
    pub(crate) middleware: MiddlewareRegistry,
    pub(crate) filters: FilterRegistry,
    pub(crate) global: Vec<MiddlewareDef>,
    pub(crate) templates: Box<dyn TemplateEngine>,
    pub(crate) classifier: Option<Box<dyn ClientClassifier>>,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Middleware run on every matched route, outermost first.
    pub fn global_middleware(&self) -> &[MiddlewareDef] {
        &self.global
    }

    pub(crate) fn negotiator(&self) -> ResponseNegotiator<'_> {
        ResponseNegotiator::new(
            self.templates.as_ref(),
            &self.config.template_prefix,
            self.config.default_format,
        )
        .with_classifier(self.classifier.as_deref())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("environment", &self.config.environment)
            .field("router", &self.router)
            .field("middleware", &self.middleware)
            .field("filters", &self.filters)
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}

/// Boot-time collector for an [`App`].
///
/// ```rust
/// use portico::{ActionResult, App, MiddlewareDef, RouteTable, handler::func, middleware::Trace};
///
/// let mut routes = RouteTable::new();
/// routes.get("/ping", func([], |_| Ok(ActionResult::success().with_message("pong"))))?;
///
/// let app = App::builder()
///     .middleware("trace", Trace)
///     .global("trace")
///     .routes(routes)
///     .build()?;
/// assert_eq!(app.router().table().len(), 1);
/// # Ok::<(), portico::Error>(())
/// ```
#[derive(Default)]
pub struct AppBuilder {
    config: Config,
    routes: RouteTable,
    strategy: MatchStrategy,
    handlers: HandlerRegistry,
    entities: EntityRegistry,
    middleware: MiddlewareRegistry,
    filters: FilterRegistry,
    global: Vec<MiddlewareDef>,
    templates: Option<Box<dyn TemplateEngine>>,
    classifier: Option<Box<dyn ClientClassifier>>,
}

impl AppBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Replaces the route table.
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn matcher(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn middleware(mut self, id: impl Into<String>, middleware: impl Middleware) -> Self {
        self.middleware.register(id, middleware);
        self
    }

    pub fn filter(mut self, id: impl Into<String>, filter: impl ResponseFilter) -> Self {
        self.filters.register(id, filter);
        self
    }

    /// Appends a middleware that wraps every matched route. Global layers
    /// run outside route layers, in the order they were added.
    pub fn global(mut self, def: impl Into<MiddlewareDef>) -> Self {
        self.global.push(def.into());
        self
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.handlers.register_controller(controller);
        self
    }

    pub fn invokable(mut self, id: impl Into<String>, handler: impl Handler) -> Self {
        self.handlers.register_invokable(id, handler);
        self
    }

    pub fn entity(mut self, kind: impl Into<String>, repository: impl EntityRepository + 'static) -> Self {
        self.entities.register(kind, repository);
        self
    }

    pub fn templates(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.templates = Some(Box::new(engine));
        self
    }

    pub fn classifier(mut self, classifier: impl ClientClassifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    /// Builds the matcher and freezes the context.
    pub fn build(self) -> Result<App> {
        let router = Router::with_matcher(self.routes, self.strategy.build())?;
        info!(
            routes = router.table().len(),
            environment = ?self.config.environment,
            "application ready"
        );

        Ok(App {
            config: self.config,
            router,
            handlers: self.handlers,
            entities: self.entities,
            middleware: self.middleware,
            filters: self.filters,
            global: self.global,
            templates: self.templates.unwrap_or_else(|| Box::new(NoTemplates)),
            classifier: self.classifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::func;
    use crate::method::Method;
    use crate::result::ActionResult;
    use crate::route::RouteMatch;

    #[test]
    fn build_freezes_routes_with_the_chosen_strategy() {
        let mut routes = RouteTable::new();
        routes.get("/widgets/{id}", func([], |_| Ok(ActionResult::success()))).unwrap();
        routes.get("/widgets/new", func([], |_| Ok(ActionResult::success())).named("new")).unwrap();

        let app = App::builder().routes(routes).matcher(MatchStrategy::Trie).build().unwrap();
        match app.router().match_path(Method::Get, "/widgets/new") {
            RouteMatch::Found { route, .. } => assert_eq!(route.handler().label(), "new"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn conflicting_trie_patterns_fail_the_build() {
        let mut routes = RouteTable::new();
        routes.get("/files/{name}", func([], |_| Ok(ActionResult::success()))).unwrap();
        routes.get("/files/{id}", func([], |_| Ok(ActionResult::success()))).unwrap();

        let err = App::builder().routes(routes).matcher(MatchStrategy::Trie).build().unwrap_err();
        assert!(matches!(err, crate::Error::InvalidRoute { .. }));
    }

    #[test]
    fn global_middleware_keeps_registration_order() {
        let app = App::builder().global("trace").global(MiddlewareDef::new("auth")).build().unwrap();
        let ids: Vec<&str> = app.global_middleware().iter().map(|d| d.id()).collect();
        assert_eq!(ids, ["trace", "auth"]);
    }
}
