//! Content negotiation: [`ActionResult`] → wire [`Response`].
//!
//! Decision order:
//!
//! 1. A redirect intent wins over everything: `Location` header, the
//!    result's status code, no body.
//! 2. Otherwise the requested [`Format`] is classified. A configured
//!    [`ClientClassifier`] answers first; then the `Accept` header; then the
//!    configured default.
//! 3. [`Format::Json`] → `{"status":…,"data":…,"message":…}`.
//! 4. [`Format::Document`] → render a template through the
//!    [`TemplateEngine`] contract. A missing template, a render error or an
//!    engine panic degrades to a small built-in document; negotiation never fails.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::result::{ActionResult, ResultStatus};
use crate::status::{self, Status};

/// The two response shapes the kernel produces.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Structured envelope for API clients.
    Json,
    /// Rendered document for browsers.
    #[default]
    Document,
}

/// Template collaborator. Template syntax is entirely its business.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, name: &str, vars: &Map<String, Value>) -> Result<String>;

    fn exists(&self, name: &str) -> bool;
}

/// Engine with no templates: every document request degrades to the built-in
/// fallback. Useful for JSON-only services.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTemplates;

impl TemplateEngine for NoTemplates {
    fn render(&self, name: &str, _vars: &Map<String, Value>) -> Result<String> {
        Err(crate::Error::Config(format!("no template engine configured (wanted `{name}`)")))
    }

    fn exists(&self, _name: &str) -> bool {
        false
    }
}

/// External client-type classifier, e.g. one that knows the API host or an
/// API-key header. `None` defers to the `Accept` header.
pub trait ClientClassifier: Send + Sync {
    fn classify(&self, req: &Request) -> Option<Format>;
}

impl<F> ClientClassifier for F
where
    F: Fn(&Request) -> Option<Format> + Send + Sync,
{
    fn classify(&self, req: &Request) -> Option<Format> {
        self(req)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    status: ResultStatus,
    data: &'a Map<String, Value>,
    message: &'a str,
}

/// Turns results into responses. Borrowed from the app context per request.
pub struct ResponseNegotiator<'a> {
    templates: &'a dyn TemplateEngine,
    classifier: Option<&'a dyn ClientClassifier>,
    template_prefix: &'a str,
    default_format: Format,
}

impl<'a> ResponseNegotiator<'a> {
    pub fn new(templates: &'a dyn TemplateEngine, template_prefix: &'a str, default_format: Format) -> Self {
        Self { templates, classifier: None, template_prefix, default_format }
    }

    pub fn with_classifier(mut self, classifier: Option<&'a dyn ClientClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// `handler` is the name of the handler that produced `result`, `None`
    /// when the kernel synthesized it (404, 405, 500). It feeds the template
    /// naming convention.
    pub fn handle(&self, req: &Request, result: ActionResult, handler: Option<&str>) -> Response {
        if let Some(location) = result.redirect() {
            return Response::builder()
                .status(result.status_code())
                .header("location", location)
                .headers(result.headers().iter().cloned())
                .no_body();
        }

        match self.classify(req) {
            Format::Json => self.envelope(&result),
            Format::Document => self.document(&result, handler),
        }
    }

    pub fn classify(&self, req: &Request) -> Format {
        if let Some(format) = self.classifier.and_then(|c| c.classify(req)) {
            return format;
        }
        match req.header("accept") {
            Some(accept) if wants_json(accept) => Format::Json,
            Some(accept) if accept.contains("text/html") => Format::Document,
            _ => self.default_format,
        }
    }

    /// Explicit template on the result, else `prefix + handler name`, else
    /// `prefix + "error"`.
    pub fn template_name(&self, result: &ActionResult, handler: Option<&str>) -> String {
        if let Some(explicit) = result.template() {
            return explicit.to_owned();
        }
        let stem = handler
            .map(|h| h.replace("::", "/").replace(['@', '.'], "/"))
            .unwrap_or_else(|| "error".to_owned());
        format!("{}{stem}", self.template_prefix)
    }

    fn envelope(&self, result: &ActionResult) -> Response {
        let envelope = Envelope {
            status: result.status(),
            data: result.data(),
            message: result.message(),
        };
        match serde_json::to_vec(&envelope) {
            Ok(body) => Response::builder()
                .status(result.status_code())
                .headers(result.headers().iter().cloned())
                .json(body),
            Err(e) => {
                warn!(error = %e, "envelope serialization failed");
                Response::builder()
                    .status(Status::InternalServerError)
                    .json(br#"{"status":"error","data":{},"message":"Internal Server Error"}"#.to_vec())
            }
        }
    }

    fn document(&self, result: &ActionResult, handler: Option<&str>) -> Response {
        let name = self.template_name(result, handler);
        let builder = Response::builder()
            .status(result.status_code())
            .headers(result.headers().iter().cloned());

        match guarded(&name, || self.templates.exists(&name)) {
            Some(true) => {}
            Some(false) => {
                warn!(template = %name, "template not found, using built-in document");
                return builder.html(fallback_document(result));
            }
            None => return builder.html(fallback_document(result)),
        }

        let mut vars = result.data().clone();
        vars.insert("status".to_owned(), Value::from(result.status().as_str()));
        vars.insert("message".to_owned(), Value::from(result.message()));
        vars.insert("status_code".to_owned(), Value::from(result.status_code()));

        match guarded(&name, || self.templates.render(&name, &vars)) {
            Some(Ok(html)) => builder.html(html),
            Some(Err(e)) => {
                warn!(template = %name, error = %e, "template render failed, using built-in document");
                builder.html(fallback_document(result))
            }
            None => builder.html(fallback_document(result)),
        }
    }
}

/// Runs one template-engine call; a panic is logged and reported as `None`.
fn guarded<T>(template: &str, call: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(template = %template, "template engine panicked, using built-in document");
            None
        }
    }
}

fn wants_json(accept: &str) -> bool {
    accept.split(',').any(|part| {
        let media = part.split(';').next().unwrap_or("").trim();
        media == "application/json" || media.ends_with("+json")
    })
}

/// Minimal page used whenever the real template cannot be rendered.
pub(crate) fn fallback_document(result: &ActionResult) -> String {
    let code = result.status_code();
    let title = match status::reason(code) {
        "" => result.status().as_str(),
        reason => reason,
    };
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{code} {title}</title></head>\
         <body><h1>{code} {title}</h1><p>{}</p></body></html>\n",
        escape_html(result.message())
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    /// Renders `name|key=value;…` with keys sorted, enough to see what the
    /// engine was given.
    struct Echo(HashMap<&'static str, bool>);

    impl TemplateEngine for Echo {
        fn render(&self, name: &str, vars: &Map<String, Value>) -> Result<String> {
            if !self.0[name] {
                return Err(crate::Error::handler("syntax error"));
            }
            let mut keys: Vec<_> = vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
            keys.sort();
            Ok(format!("{name}|{}", keys.join(";")))
        }

        fn exists(&self, name: &str) -> bool {
            self.0.contains_key(name)
        }
    }

    fn engine() -> Echo {
        Echo(HashMap::from([("pages/widgets/show", true), ("pages/broken", false)]))
    }

    fn json_request() -> Request {
        Request::builder().header("Accept", "application/json").build()
    }

    fn html_request() -> Request {
        Request::builder().header("Accept", "text/html,application/xhtml+xml").build()
    }

    #[test]
    fn json_envelope_has_fixed_key_order_and_status_code() {
        let templates = engine();
        let negotiator = ResponseNegotiator::new(&templates, "pages/", Format::Document);
        let result = ActionResult::success().with_value("id", json!(5)).with_message("ok");

        let res = negotiator.handle(&json_request(), result, Some("widgets.show"));
        assert_eq!(res.status(), 200);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body_text(), r#"{"status":"success","data":{"id":5},"message":"ok"}"#);
    }

    #[test]
    fn redirect_wins_regardless_of_format() {
        let templates = engine();
        let negotiator = ResponseNegotiator::new(&templates, "pages/", Format::Json);
        let result = ActionResult::redirect_to("/login").with_status(Status::SeeOther);

        let res = negotiator.handle(&json_request(), result, None);
        assert_eq!(res.status(), 303);
        assert_eq!(res.header("location"), Some("/login"));
        assert!(res.body().is_empty());
    }

    #[test]
    fn document_uses_convention_and_merges_envelope_fields() {
        let templates = engine();
        let negotiator = ResponseNegotiator::new(&templates, "pages/", Format::Json);
        let result = ActionResult::success().with_value("name", json!("cog")).with_message("hi");

        let res = negotiator.handle(&html_request(), result, Some("widgets.show"));
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(
            res.body_text(),
            r#"pages/widgets/show|message="hi";name="cog";status="success";status_code=200"#
        );
    }

    #[test]
    fn missing_or_failing_template_degrades_to_builtin_document() {
        let templates = engine();
        let negotiator = ResponseNegotiator::new(&templates, "pages/", Format::Document);

        let missing = ActionResult::fail("No <such> widget").with_status(Status::NotFound);
        let res = negotiator.handle(&html_request(), missing, None);
        assert_eq!(res.status(), 404);
        assert!(res.body_text().contains("<h1>404 Not Found</h1>"));
        assert!(res.body_text().contains("No &lt;such&gt; widget"));

        let broken = ActionResult::success().with_template("pages/broken");
        let res = negotiator.handle(&html_request(), broken, Some("widgets.show"));
        assert_eq!(res.status(), 200);
        assert!(res.body_text().contains("<h1>200 OK</h1>"));
    }

    struct Exploding {
        in_exists: bool,
    }

    impl TemplateEngine for Exploding {
        fn render(&self, _name: &str, _vars: &Map<String, Value>) -> Result<String> {
            panic!("render blew up")
        }

        fn exists(&self, _name: &str) -> bool {
            if self.in_exists {
                panic!("lookup blew up");
            }
            true
        }
    }

    #[test]
    fn panicking_engine_degrades_to_builtin_document() {
        for in_exists in [false, true] {
            let templates = Exploding { in_exists };
            let negotiator = ResponseNegotiator::new(&templates, "pages/", Format::Document);
            let result = ActionResult::fail("Out of <stock>").with_status(Status::Conflict);

            let res = negotiator.handle(&html_request(), result, Some("widgets.show"));
            assert_eq!(res.status(), 409, "panic in exists: {in_exists}");
            assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
            assert!(res.body_text().contains("<h1>409 Conflict</h1>"));
            assert!(res.body_text().contains("Out of &lt;stock&gt;"));
        }
    }

    #[test]
    fn classification_order() {
        let templates = NoTemplates;
        let api_host = |req: &Request| req.header("host").filter(|h| h.starts_with("api.")).map(|_| Format::Json);
        let negotiator = ResponseNegotiator::new(&templates, "", Format::Document)
            .with_classifier(Some(&api_host));

        let api = Request::builder().header("Host", "api.example.com").header("Accept", "text/html").build();
        assert_eq!(negotiator.classify(&api), Format::Json);
        assert_eq!(negotiator.classify(&html_request()), Format::Document);
        let problem = Request::builder().header("Accept", "application/problem+json; q=0.9").build();
        assert_eq!(negotiator.classify(&problem), Format::Json);
        assert_eq!(negotiator.classify(&Request::builder().build()), Format::Document);
    }

    #[test]
    fn template_name_mapping() {
        let templates = NoTemplates;
        let negotiator = ResponseNegotiator::new(&templates, "views/", Format::Document);
        let plain = ActionResult::success();
        assert_eq!(negotiator.template_name(&plain, Some("admin::users@index")), "views/admin/users/index");
        assert_eq!(negotiator.template_name(&plain, None), "views/error");
        assert_eq!(negotiator.template_name(&plain.with_template("custom"), Some("x")), "custom");
    }
}
