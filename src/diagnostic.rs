//! Development error page.
//!
//! In [`Environment::Development`](crate::config::Environment::Development)
//! the dispatcher returns unhandled failures instead of masking them; the
//! transport renders them here. Never used in production.

use std::error::Error as _;

use crate::error::Error;
use crate::negotiate::escape_html;
use crate::response::Response;
use crate::status::Status;

/// A `500` HTML page naming the error and every source below it.
pub fn render(err: &Error) -> Response {
    let mut causes = String::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push_str("<li>");
        causes.push_str(&escape_html(&cause.to_string()));
        causes.push_str("</li>");
        source = cause.source();
    }

    let causes = if causes.is_empty() {
        String::new()
    } else {
        format!("<h2>Caused by</h2><ol>{causes}</ol>")
    };

    let page = format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>500 Internal Server Error</title>\
         <style>body{{font-family:monospace;margin:2rem}}pre{{background:#f4f4f4;padding:1rem}}</style>\
         </head><body><h1>Unhandled error</h1><pre>{}</pre>{causes}\
         <p>Development mode. In production this page is replaced by a generic message.</p>\
         </body></html>\n",
        escape_html(&err.to_string())
    );

    Response::builder().status(Status::InternalServerError).html(page)
}
