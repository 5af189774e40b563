//! Incoming request type.
//!
//! Transport-neutral: the HTTP server builds one from a hyper request, a
//! console command builds one with [`Request::builder`]. The dispatcher fills
//! in the path variables once the route is matched.

use std::collections::HashMap;
use std::net::SocketAddr;

use url::form_urlencoded;

use crate::error::Result;
use crate::method::Method;

/// An incoming request.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: HashMap<String, String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        query: HashMap<String, String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self { method, path, query, headers, body, params: HashMap::new(), remote_addr: None }
    }

    pub(crate) fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Builder for console invocations and tests. Defaults to `GET /`.
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::Get,
            uri: "/".to_owned(),
            headers: Vec::new(),
            body: Vec::new(),
            remote_addr: None,
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Peer address of the connection the request arrived on. `None` for
    /// console invocations.
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path variable.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a decoded query-string value. Repeated keys keep the last value.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Replaces or adds a header. Middleware uses this to annotate the
    /// request on its way in.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value,
            None => self.headers.push((name.to_owned(), value)),
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

/// Splits `"/a/b?x=1&y=2"` into the path and the decoded query map.
pub(crate) fn split_uri(uri: &str) -> (String, HashMap<String, String>) {
    match uri.split_once('?') {
        Some((path, query)) => (path.to_owned(), parse_query(query)),
        None => (uri.to_owned(), HashMap::new()),
    }
}

pub(crate) fn parse_query(query: &str) -> HashMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Fluent builder for [`Request`]. Obtain via [`Request::builder()`].
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    remote_addr: Option<SocketAddr>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Parses the method name, ignoring case.
    pub fn method_str(mut self, method: &str) -> Result<Self> {
        self.method = method.parse()?;
        Ok(self)
    }

    /// Path with an optional query string, e.g. `/widgets/5?expand=parts`.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        let (path, query) = split_uri(&self.uri);
        let mut req = Request::new(self.method, path, query, self.headers, self.body);
        req.remote_addr = self.remote_addr;
        req
    }
}
