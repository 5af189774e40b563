//! A small widget catalogue on top of portico.
//!
//! ```text
//! cargo run --example widgets                       # HTTP on the configured address
//! cargo run --example widgets -- GET /widgets/1     # one request, printed to stdout
//! cargo run --example widgets -- GET /widgets/1 json
//! ```
//!
//! `PORTICO_ENV=development` switches unhandled failures to the diagnostic
//! page; try `GET /widgets/1/explode`.

use std::collections::BTreeMap;
use std::io;
use std::sync::RwLock;

use serde_json::{Map, Value, json};

use portico::emit::{ConsoleEmitter, Emitter};
use portico::handler::func;
use portico::middleware::{SetHeaders, Trace};
use portico::{
    ActionResult, App, Config, Dispatcher, Entity, EntityRepository, Error, FilterDef, Format, Method,
    MiddlewareDef, Param, Request, Result, RouteTable, Server, Status, TemplateEngine, observability,
};

struct Catalogue {
    widgets: RwLock<BTreeMap<u64, Entity>>,
}

impl Catalogue {
    fn seeded() -> Self {
        let widgets = [(1, "sprocket", "Sprocket"), (2, "flange", "Flange")]
            .into_iter()
            .map(|(id, slug, name)| {
                let mut w = Entity::new();
                w.insert("id".to_owned(), json!(id));
                w.insert("slug".to_owned(), json!(slug));
                w.insert("name".to_owned(), json!(name));
                (id, w)
            })
            .collect();
        Self { widgets: RwLock::new(widgets) }
    }
}

impl EntityRepository for Catalogue {
    fn find_by_primary_key(&self, value: &str) -> Result<Option<Entity>> {
        let Ok(id) = value.parse::<u64>() else { return Ok(None) };
        let widgets = self.widgets.read().map_err(|_| Error::handler("catalogue lock poisoned"))?;
        Ok(widgets.get(&id).cloned())
    }

    fn find_by_slug(&self, value: &str) -> Result<Option<Entity>> {
        let widgets = self.widgets.read().map_err(|_| Error::handler("catalogue lock poisoned"))?;
        Ok(widgets.values().find(|w| w["slug"] == value).cloned())
    }
}

/// `{{key}}` substitution over a fixed set of pages.
struct Pages;

impl Pages {
    fn source(name: &str) -> Option<&'static str> {
        match name {
            "pages/widgets/show" => Some("<h1>{{name}}</h1><p>#{{id}} ({{slug}})</p>"),
            "pages/error" => Some("<h1>{{status_code}}</h1><p>{{message}}</p>"),
            _ => None,
        }
    }
}

impl TemplateEngine for Pages {
    fn render(&self, name: &str, vars: &Map<String, Value>) -> Result<String> {
        let mut html = Self::source(name)
            .ok_or_else(|| Error::handler(format!("no page `{name}`")))?
            .to_owned();
        for (key, value) in vars {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            html = html.replace(&format!("{{{{{key}}}}}"), &text);
        }
        Ok(html)
    }

    fn exists(&self, name: &str) -> bool {
        Self::source(name).is_some()
    }
}

fn routes() -> Result<RouteTable> {
    let mut routes = RouteTable::new();

    routes.get(
        "/widgets/{id}",
        func([Param::entity("widget", "widget")], |args| {
            Ok(match args.entity("widget") {
                Some(w) => ActionResult::success().with_data(w.clone()),
                None => ActionResult::fail("Widget not found").with_status(Status::NotFound),
            })
        })
        .named("widgets.show"),
    )?;

    routes.get(
        "/widgets/{id}/explode",
        func([Param::value("id")], |args| -> Result<ActionResult> {
            panic!("widget {} exploded", args.str("id").unwrap_or("?"))
        })
        .named("widgets.explode"),
    )?;

    routes.get("/catalogue", func([], |_| Ok(ActionResult::redirect_to("/widgets/1"))).named("catalogue"))?;

    routes.group(
        "/api",
        vec![MiddlewareDef::new("trace").with("label", json!("api"))],
        vec![FilterDef::new("headers").with("cache-control", json!("no-store"))],
        |api| {
            api.get(
                "/widgets",
                func([Param::value("limit").default(json!("10"))], |args| {
                    let limit = args.str("limit").and_then(|l| l.parse::<usize>().ok());
                    let Some(limit) = limit else {
                        return Ok(ActionResult::fail("limit must be a number")
                            .with_status(Status::UnprocessableContent)
                            .with_value("field", json!("limit")));
                    };
                    Ok(ActionResult::success().with_value("limit", json!(limit)))
                })
                .named("api.widgets.index"),
            )?;
            Ok(())
        },
    )?;

    Ok(routes)
}

fn build(config: Config) -> Result<Dispatcher> {
    let app = App::builder()
        .config(config)
        .routes(routes()?)
        .entity("widget", Catalogue::seeded())
        .templates(Pages)
        .middleware("trace", Trace)
        .filter("headers", SetHeaders)
        .classifier(|req: &Request| req.path().starts_with("/api/").then_some(Format::Json))
        .build()?;
    Ok(Dispatcher::new(app))
}

fn config() -> Result<Config> {
    let base = match std::env::var("PORTICO_CONFIG") {
        Ok(path) => Config::load(path)?,
        Err(_) => Config { template_prefix: "pages/".to_owned(), ..Config::default() },
    };
    base.with_env_overrides()
}

fn run_console(dispatcher: &Dispatcher, args: &[String]) -> Result<()> {
    let method: Method = args[0].parse()?;
    let mut builder = Request::builder().method(method).uri(args[1].as_str());
    if args.get(2).map(String::as_str) == Some("json") {
        builder = builder.header("Accept", "application/json");
    }

    let response = match dispatcher.dispatch(builder.build()) {
        Ok(response) => response,
        Err(err) => portico::diagnostic::render(&err),
    };
    ConsoleEmitter::new(io::stdout().lock()).emit(response)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config()?;
    observability::init_tracing(&config.log);

    let bind = config.bind_address.clone();
    let dispatcher = build(config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() >= 2 {
        return run_console(&dispatcher, &args);
    }

    Server::bind(&bind)?.serve(dispatcher).await
}
